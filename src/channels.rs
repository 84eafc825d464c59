//! Channel registry: remote `channels` collection with a local `channels.json` fallback.

use crate::drive::extract_folder_id;
use crate::error::Result;
use crate::models::{Channel, MetadataPolicy};
use crate::store::{DocumentStore, RemoteRead, TwoTier, CHANNELS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const LOCAL_FILE: &str = "channels.json";

/// Channel ids key the shared rotation document, so each must be usable as a
/// single field name there.
pub fn is_valid_channel_id(channel_id: &str) -> bool {
    !channel_id.is_empty() && !channel_id.contains('.') && !channel_id.starts_with('$')
}

#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn channels(&self) -> Result<Vec<Channel>>;

    async fn channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        Ok(self
            .channels()
            .await?
            .into_iter()
            .find(|channel| channel.id == channel_id))
    }

    async fn enabled_channels(&self) -> Result<Vec<Channel>> {
        Ok(self
            .channels()
            .await?
            .into_iter()
            .filter(|channel| channel.enabled)
            .collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsFile {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Remote channel document, as written by the dashboard.
#[derive(Debug, Deserialize)]
struct ChannelDocument {
    channel_id: String,
    #[serde(default)]
    channel_name: String,
    #[serde(default)]
    drive_folder_id: String,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    youtube_account: Option<String>,
    #[serde(default)]
    use_ai_metadata: Option<bool>,
    #[serde(default)]
    title_template: Option<String>,
    #[serde(default)]
    description_template: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

impl From<ChannelDocument> for Channel {
    fn from(doc: ChannelDocument) -> Self {
        let defaults = MetadataPolicy::default();
        Channel {
            youtube_account: doc
                .youtube_account
                .filter(|account| !account.is_empty())
                .unwrap_or_else(|| doc.channel_id.clone()),
            id: doc.channel_id,
            name: doc.channel_name,
            enabled: doc.enabled.unwrap_or(true),
            drive_folder_id: doc.drive_folder_id,
            policy: MetadataPolicy {
                use_ai_metadata: doc.use_ai_metadata.unwrap_or(defaults.use_ai_metadata),
                title_template: doc.title_template.unwrap_or(defaults.title_template),
                description_template: doc
                    .description_template
                    .unwrap_or(defaults.description_template),
                default_tags: doc.tags,
                category_id: doc.category_id.unwrap_or(defaults.category_id),
                categories: doc.categories,
            },
        }
    }
}

pub struct ChannelDirectory {
    tier: TwoTier<ChannelsFile>,
}

impl ChannelDirectory {
    pub fn new(remote: Option<Arc<dyn DocumentStore>>, data_dir: &Path) -> Self {
        Self {
            tier: TwoTier::new(remote, data_dir.join(LOCAL_FILE)),
        }
    }

    async fn remote_channels(&self) -> Option<Vec<Channel>> {
        let query = RemoteRead::Find {
            collection: CHANNELS,
            filter: json!({}),
            projection: None,
        };
        match self.tier.read_remote(query).await {
            Ok(documents) if !documents.is_empty() => Some(
                documents
                    .into_iter()
                    .filter_map(|doc: Value| match serde_json::from_value::<ChannelDocument>(doc) {
                        Ok(doc) => Some(Channel::from(doc)),
                        Err(e) => {
                            warn!("Skipping malformed channel document: {}", e);
                            None
                        }
                    })
                    .collect(),
            ),
            Ok(_) => {
                debug!("No channels stored remotely");
                None
            }
            Err(e) => {
                debug!("Channels not readable remotely: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ChannelRegistry for ChannelDirectory {
    async fn channels(&self) -> Result<Vec<Channel>> {
        let channels = match self.remote_channels().await {
            Some(channels) => channels,
            None => self.tier.local().load()?.unwrap_or_default().channels,
        };
        Ok(channels
            .into_iter()
            .filter(|channel| {
                let valid = is_valid_channel_id(&channel.id);
                if !valid {
                    warn!("Skipping channel with unusable id {:?}", channel.id);
                }
                valid
            })
            .map(|mut channel| {
                channel.drive_folder_id = extract_folder_id(&channel.drive_folder_id);
                channel
            })
            .collect())
    }
}
