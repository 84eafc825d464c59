use super::{DocumentStore, LocalJson};
use crate::error::{PublisherError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub enum RemoteRead {
    FindOne {
        collection: &'static str,
        filter: Value,
    },
    Find {
        collection: &'static str,
        filter: Value,
        projection: Option<Value>,
    },
}

#[derive(Debug, Clone)]
pub enum RemoteWrite {
    InsertOne {
        collection: &'static str,
        document: Value,
    },
    UpdateOne {
        collection: &'static str,
        filter: Value,
        update: Value,
        upsert: bool,
    },
    DeleteMany {
        collection: &'static str,
        filter: Value,
    },
}

impl RemoteWrite {
    fn collection(&self) -> &'static str {
        match self {
            RemoteWrite::InsertOne { collection, .. }
            | RemoteWrite::UpdateOne { collection, .. }
            | RemoteWrite::DeleteMany { collection, .. } => *collection,
        }
    }
}

/// Which tiers accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub local: bool,
    pub remote: bool,
}

/// Remote-primary, local-fallback persistence.
///
/// Reads try the remote first and leave the local fallback to the caller,
/// since each store knows how much of its data the local file can represent.
/// Writes always hit the local file first, then the remote best-effort.
pub struct TwoTier<L> {
    remote: Option<Arc<dyn DocumentStore>>,
    local: LocalJson<L>,
}

impl<L> TwoTier<L>
where
    L: Serialize + DeserializeOwned + Default,
{
    pub fn new(remote: Option<Arc<dyn DocumentStore>>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            local: LocalJson::new(local_path),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalJson<L> {
        &self.local
    }

    fn remote_store(&self) -> Result<&dyn DocumentStore> {
        self.remote
            .as_deref()
            .ok_or_else(|| PublisherError::store("no remote store configured"))
    }

    /// Runs a remote read. Errors mean "use the local tier".
    pub async fn read_remote(&self, query: RemoteRead) -> Result<Vec<Value>> {
        let remote = self.remote_store()?;
        match query {
            RemoteRead::FindOne { collection, filter } => {
                Ok(remote.find_one(collection, filter).await?.into_iter().collect())
            }
            RemoteRead::Find {
                collection,
                filter,
                projection,
            } => remote.find(collection, filter, projection).await,
        }
    }

    /// Local contents; a missing or unreadable file yields `None`.
    pub fn load_local(&self) -> Option<L> {
        match self.local.load() {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Ignoring unreadable local store {}: {}",
                    self.local.path().display(),
                    e
                );
                None
            }
        }
    }

    /// Mutates the local file, then applies each remote write in order.
    /// Failures are logged, never returned.
    pub async fn write<F>(&self, mutate_local: F, remote_ops: Vec<RemoteWrite>) -> WriteReport
    where
        F: FnOnce(&mut L),
    {
        let mut value = self.load_local().unwrap_or_default();
        mutate_local(&mut value);
        let local = match self.local.save(&value) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to write local store {}: {}",
                    self.local.path().display(),
                    e
                );
                false
            }
        };

        let remote = if self.has_remote() {
            let mut accepted = true;
            for op in remote_ops {
                let collection = op.collection();
                if let Err(e) = self.apply_remote(op).await {
                    warn!("Remote write to {} failed, kept local copy: {}", collection, e);
                    accepted = false;
                    break;
                }
            }
            accepted
        } else {
            debug!("No remote store configured, wrote local tier only");
            false
        };

        WriteReport { local, remote }
    }

    /// A single remote write whose failure the caller wants to see.
    pub async fn apply_remote(&self, op: RemoteWrite) -> Result<u64> {
        let remote = self.remote_store()?;
        match op {
            RemoteWrite::InsertOne {
                collection,
                document,
            } => remote.insert_one(collection, document).await.map(|_| 1),
            RemoteWrite::UpdateOne {
                collection,
                filter,
                update,
                upsert,
            } => remote
                .update_one(collection, filter, update, upsert)
                .await
                .map(|_| 1),
            RemoteWrite::DeleteMany { collection, filter } => {
                remote.delete_many(collection, filter).await
            }
        }
    }
}
