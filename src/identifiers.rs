//! Record of already-published source items.

use crate::error::Result;
use crate::models::{PublishedRecord, PublishedSet};
use crate::store::{
    DocumentStore, RemoteRead, RemoteWrite, TwoTier, UPLOADED_VIDEOS, UPLOAD_HISTORY,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LOCAL_FILE: &str = "uploaded_videos.json";

pub struct IdentifierStore {
    tier: TwoTier<BTreeSet<String>>,
}

impl IdentifierStore {
    pub fn new(remote: Option<Arc<dyn DocumentStore>>, data_dir: &Path) -> Self {
        Self {
            tier: TwoTier::new(remote, data_dir.join(LOCAL_FILE)),
        }
    }

    fn local_ids(&self) -> BTreeSet<String> {
        self.tier.load_local().unwrap_or_default()
    }

    /// Reads every published id and file name.
    ///
    /// Falls back to the local id list when the remote is unavailable; names
    /// cannot be matched in that mode.
    pub async fn snapshot(&self) -> PublishedSet {
        let query = RemoteRead::Find {
            collection: UPLOADED_VIDEOS,
            filter: json!({}),
            projection: Some(json!({ "video_id": 1, "file_name": 1 })),
        };
        match self.tier.read_remote(query).await {
            Ok(documents) => {
                let mut set = PublishedSet::new();
                for doc in &documents {
                    if let Some(id) = doc.get("video_id").and_then(Value::as_str) {
                        set.insert(id, doc.get("file_name").and_then(Value::as_str));
                    }
                }
                // Ids written while the remote was unreachable.
                set.extend_ids(self.local_ids());
                if set.is_empty() {
                    debug!("Nothing published yet");
                } else {
                    debug!("{} items already published", set.len());
                }
                set
            }
            Err(e) => {
                warn!("Published records unavailable remotely ({}), matching local ids only", e);
                PublishedSet::ids_only(self.local_ids())
            }
        }
    }

    pub async fn contains(&self, item_id: &str, display_name: &str) -> bool {
        self.snapshot().await.contains(item_id, display_name)
    }

    /// Stores a successful publish. Never fails: the video is already live,
    /// so a lost record is only logged.
    pub async fn record(&self, record: &PublishedRecord) {
        let document = match serde_json::to_value(record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Could not serialize published record {}: {}", record.video_id, e);
                json!({ "video_id": record.video_id })
            }
        };
        let remote_ops = vec![
            RemoteWrite::UpdateOne {
                collection: UPLOADED_VIDEOS,
                filter: json!({ "video_id": record.video_id }),
                update: json!({ "$set": document.clone() }),
                upsert: true,
            },
            RemoteWrite::InsertOne {
                collection: UPLOAD_HISTORY,
                document,
            },
        ];

        let video_id = record.video_id.clone();
        let report = self
            .tier
            .write(
                |ids| {
                    ids.insert(video_id);
                },
                remote_ops,
            )
            .await;

        if report.local || report.remote {
            info!(
                "Recorded {} ({}) as published to {}",
                record.file_name, record.video_id, record.youtube_url
            );
        } else {
            warn!(
                "Published {} but could not record it anywhere; it may be uploaded again",
                record.video_id
            );
        }
    }

    /// Publish log, newest first. Only the remote keeps it, so an unreachable
    /// remote is an error here.
    pub async fn history(
        &self,
        channel_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PublishedRecord>> {
        let filter = match channel_id {
            Some(channel_id) => json!({ "channel_id": channel_id }),
            None => json!({}),
        };
        let documents = self
            .tier
            .read_remote(RemoteRead::Find {
                collection: UPLOAD_HISTORY,
                filter,
                projection: None,
            })
            .await?;

        // Reversed so that entries with equal timestamps stay newest first.
        let mut records: Vec<PublishedRecord> = documents
            .into_iter()
            .rev()
            .filter_map(|doc| match serde_json::from_value(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed history entry: {}", e);
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Forgets every record of one channel so its items become eligible again.
    pub async fn clear_channel(&self, channel_id: &str) -> Result<u64> {
        let filter = json!({ "channel_id": channel_id });
        let cleared: BTreeSet<String> = self
            .tier
            .read_remote(RemoteRead::Find {
                collection: UPLOADED_VIDEOS,
                filter: filter.clone(),
                projection: Some(json!({ "video_id": 1 })),
            })
            .await?
            .iter()
            .filter_map(|doc| doc.get("video_id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let deleted = self
            .tier
            .apply_remote(RemoteWrite::DeleteMany {
                collection: UPLOADED_VIDEOS,
                filter,
            })
            .await?;

        let mut local = self.local_ids();
        local.retain(|id| !cleared.contains(id));
        self.tier.local().save(&local)?;

        info!("Deleted {} published records for channel {}", deleted, channel_id);
        Ok(deleted)
    }

    /// Forgets everything, in both tiers.
    pub async fn clear_all(&self) -> Result<u64> {
        self.tier.local().save(&BTreeSet::new())?;
        let deleted = if self.tier.has_remote() {
            self.tier
                .apply_remote(RemoteWrite::DeleteMany {
                    collection: UPLOADED_VIDEOS,
                    filter: json!({}),
                })
                .await?
        } else {
            0
        };
        warn!("Deleted all {} published records", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn record(id: &str, name: &str, channel: &str) -> PublishedRecord {
        PublishedRecord {
            video_id: id.to_string(),
            file_name: name.to_string(),
            youtube_id: format!("yt-{}", id),
            youtube_url: format!("https://www.youtube.com/shorts/yt-{}", id),
            channel_id: channel.to_string(),
            uploaded_at: Utc::now(),
        }
    }

    fn store_with(remote: &Arc<MemoryStore>, dir: &Path) -> IdentifierStore {
        IdentifierStore::new(Some(remote.clone() as Arc<dyn DocumentStore>), dir)
    }

    #[tokio::test]
    async fn contains_matches_by_id_and_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let store = store_with(&remote, dir.path());

        store.record(&record("id-1", "Sunset.mp4", "channel_1")).await;

        assert!(store.contains("id-1", "other.mp4").await);
        assert!(store.contains("re-uploaded-id", "sunset.MP4").await);
        assert!(!store.contains("id-2", "other.mp4").await);
    }

    #[tokio::test]
    async fn recording_twice_keeps_one_dedup_document() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let store = store_with(&remote, dir.path());

        store.record(&record("id-1", "a.mp4", "channel_1")).await;
        store.record(&record("id-1", "a.mp4", "channel_1")).await;

        assert_eq!(remote.documents(UPLOADED_VIDEOS).len(), 1);
        assert_eq!(remote.documents(UPLOAD_HISTORY).len(), 2);
        assert!(store.contains("id-1", "a.mp4").await);
    }

    #[tokio::test]
    async fn offline_record_and_contains_use_local_ids() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::offline());
        let store = store_with(&remote, dir.path());

        store.record(&record("id-1", "a.mp4", "channel_1")).await;

        assert!(store.contains("id-1", "a.mp4").await);
        // Names are not kept locally.
        assert!(!store.contains("id-9", "a.mp4").await);
        assert!(dir.path().join(LOCAL_FILE).exists());
    }

    #[tokio::test]
    async fn ids_recorded_during_outage_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::offline());
        let store = store_with(&remote, dir.path());

        store.record(&record("id-1", "a.mp4", "channel_1")).await;
        remote.set_offline(false);

        let set = store.snapshot().await;
        assert!(set.names_available());
        assert!(set.contains_id("id-1"));
    }

    #[tokio::test]
    async fn clear_channel_only_removes_that_channel() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let store = IdentifierStore::new(
            Some(remote.clone() as Arc<dyn DocumentStore>),
            dir.path(),
        );
        store.record(&record("id-1", "a.mp4", "channel_1")).await;
        store.record(&record("id-2", "b.mp4", "channel_2")).await;

        assert_eq!(store.clear_channel("channel_1").await.unwrap(), 1);
        let remaining = remote.documents(UPLOADED_VIDEOS);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["video_id"], "id-2");
        assert!(!store.contains("id-1", "a.mp4").await);
        assert!(store.contains("id-2", "b.mp4").await);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_filtered_by_channel() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let store = store_with(&remote, dir.path());
        let start = Utc::now();
        for (i, channel) in ["channel_1", "channel_2", "channel_1", "channel_1"]
            .iter()
            .enumerate()
        {
            let mut entry = record(&format!("id-{}", i), "a.mp4", channel);
            entry.uploaded_at = start + chrono::Duration::minutes(i as i64);
            store.record(&entry).await;
        }
        remote
            .insert_one(UPLOAD_HISTORY, json!({ "video_id": "legacy" }))
            .await
            .unwrap();

        let ids = |records: Vec<PublishedRecord>| -> Vec<String> {
            records.into_iter().map(|r| r.video_id).collect()
        };
        assert_eq!(
            ids(store.history(Some("channel_1"), 2).await.unwrap()),
            vec!["id-3", "id-2"]
        );
        assert_eq!(store.history(None, 50).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn history_needs_the_remote() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&Arc::new(MemoryStore::offline()), dir.path());
        store.record(&record("id-1", "a.mp4", "channel_1")).await;

        assert!(store.history(None, 10).await.is_err());
    }

    #[tokio::test]
    async fn clear_all_empties_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let store = store_with(&remote, dir.path());
        store.record(&record("id-1", "a.mp4", "channel_1")).await;

        store.clear_all().await.unwrap();

        assert!(!store.contains("id-1", "a.mp4").await);
    }
}
