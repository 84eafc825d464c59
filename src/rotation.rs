//! Per-channel subfolder rotation cursor.

use crate::models::RotationCursor;
use crate::store::{DocumentStore, RemoteRead, RemoteWrite, TwoTier, WriteReport, FOLDER_ROTATION};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LOCAL_FILE: &str = "folder_rotation.json";
pub const TRACKER_DOC_ID: &str = "tracker";

pub struct RotationTracker {
    tier: TwoTier<BTreeMap<String, RotationCursor>>,
}

impl RotationTracker {
    pub fn new(remote: Option<Arc<dyn DocumentStore>>, data_dir: &Path) -> Self {
        Self {
            tier: TwoTier::new(remote, data_dir.join(LOCAL_FILE)),
        }
    }

    async fn remote_cursor(&self, channel_id: &str) -> Option<RotationCursor> {
        let query = RemoteRead::FindOne {
            collection: FOLDER_ROTATION,
            filter: json!({ "_id": TRACKER_DOC_ID }),
        };
        let documents = match self.tier.read_remote(query).await {
            Ok(documents) => documents,
            Err(e) => {
                debug!("Rotation tracker not readable remotely: {}", e);
                return None;
            }
        };
        let entry = documents
            .first()
            .and_then(|doc| doc.get("channels"))
            .and_then(|channels| channels.get(channel_id))?;
        match serde_json::from_value::<RotationCursor>(entry.clone()) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                warn!("Ignoring malformed remote cursor for {}: {}", channel_id, e);
                None
            }
        }
    }

    fn local_cursor(&self, channel_id: &str) -> Option<RotationCursor> {
        self.tier
            .load_local()
            .and_then(|mut cursors| cursors.remove(channel_id))
    }

    /// Remote cursor preferred; the newer one wins when both tiers have one.
    /// Defaults to index 0.
    pub async fn get_cursor(&self, channel_id: &str) -> RotationCursor {
        let remote = self.remote_cursor(channel_id).await;
        let local = self.local_cursor(channel_id);
        match (remote, local) {
            (Some(remote), Some(local)) if local.updated_at > remote.updated_at => local,
            (Some(remote), _) => remote,
            (None, Some(local)) => local,
            (None, None) => RotationCursor::default(),
        }
    }

    pub async fn set_cursor(
        &self,
        channel_id: &str,
        index: usize,
        folder_id: &str,
        folder_name: &str,
    ) -> WriteReport {
        let cursor = RotationCursor {
            current_index: index,
            current_folder_id: Some(folder_id.to_string()),
            current_folder_name: Some(folder_name.to_string()),
            updated_at: Some(Utc::now()),
        };
        let mut fields = Map::new();
        fields.insert(
            format!("channels.{}", channel_id),
            serde_json::to_value(&cursor).unwrap_or(Value::Null),
        );
        let remote_ops = vec![RemoteWrite::UpdateOne {
            collection: FOLDER_ROTATION,
            filter: json!({ "_id": TRACKER_DOC_ID }),
            update: json!({ "$set": fields }),
            upsert: true,
        }];

        let report = self
            .tier
            .write(
                |cursors| {
                    cursors.insert(channel_id.to_string(), cursor);
                },
                remote_ops,
            )
            .await;

        info!(
            "Rotation for {} now at subfolder {} ({})",
            channel_id, index, folder_name
        );
        report
    }
}
