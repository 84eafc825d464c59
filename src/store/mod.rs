//! Document persistence: a remote primary tier and a local JSON file tier.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod data_api;
pub mod local;
pub mod memory;
pub mod tiered;

pub use data_api::DataApiStore;
pub use local::LocalJson;
pub use memory::MemoryStore;
pub use tiered::{RemoteRead, RemoteWrite, TwoTier, WriteReport};

pub const UPLOADED_VIDEOS: &str = "uploaded_videos";
pub const UPLOAD_HISTORY: &str = "upload_history";
pub const FOLDER_ROTATION: &str = "folder_rotation";
pub const CHANNELS: &str = "channels";

/// A remote store of JSON documents grouped in named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>>;

    async fn find(
        &self,
        collection: &str,
        filter: Value,
        projection: Option<Value>,
    ) -> Result<Vec<Value>>;

    async fn insert_one(&self, collection: &str, document: Value) -> Result<()>;

    /// Applies `update` (a `$set` document) to the first match, inserting when
    /// nothing matches and `upsert` is set.
    async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
        upsert: bool,
    ) -> Result<()>;

    async fn delete_many(&self, collection: &str, filter: Value) -> Result<u64>;
}
