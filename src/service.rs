//! The operations exposed to the CLI: selection, metadata, recording and
//! the per-channel publish flow built from them.

use crate::channels::{is_valid_channel_id, ChannelRegistry};
use crate::drive::{ContentSource, FolderLister};
use crate::error::{PublisherError, Result};
use crate::identifiers::IdentifierStore;
use crate::metadata::{clamp, template_metadata, MetadataResolver};
use crate::models::{
    Channel, ChannelStats, Item, ItemStatus, MetadataResult, PublishOutcome, PublishedRecord,
    RotationCursor,
};
use crate::rotation::RotationTracker;
use crate::selector::{CursorMode, NextItemSelector, Selection};
use crate::store::WriteReport;
use crate::youtube::{VideoPublisher, VideoUpload};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const PRIVACY_STATUS: &str = "public";

/// Collaborators of a [`PublisherService`].
pub struct ServiceParts {
    pub registry: Arc<dyn ChannelRegistry>,
    pub identifiers: Arc<IdentifierStore>,
    pub tracker: Arc<RotationTracker>,
    pub source: Arc<dyn ContentSource>,
    pub item_page_size: u32,
    pub resolver: MetadataResolver,
    pub publisher: Arc<dyn VideoPublisher>,
}

/// What a dry run would publish next, without touching any state.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub channel_id: String,
    pub item: Option<Item>,
    pub metadata: Option<MetadataResult>,
}

pub struct PublisherService {
    registry: Arc<dyn ChannelRegistry>,
    identifiers: Arc<IdentifierStore>,
    tracker: Arc<RotationTracker>,
    lister: Arc<FolderLister>,
    selector: NextItemSelector,
    resolver: MetadataResolver,
    publisher: Arc<dyn VideoPublisher>,
}

impl PublisherService {
    pub fn new(parts: ServiceParts) -> Self {
        let lister = Arc::new(FolderLister::new(parts.source, parts.item_page_size));
        Self {
            selector: NextItemSelector::new(lister.clone(), parts.tracker.clone()),
            registry: parts.registry,
            identifiers: parts.identifiers,
            tracker: parts.tracker,
            lister,
            resolver: parts.resolver,
            publisher: parts.publisher,
        }
    }

    pub async fn channels(&self) -> Result<Vec<Channel>> {
        self.registry.channels().await
    }

    /// Looks a channel up and checks it has a source folder and an account.
    async fn channel(&self, channel_id: &str) -> Result<Channel> {
        if !is_valid_channel_id(channel_id) {
            return Err(PublisherError::config(format!(
                "channel id {:?} cannot contain '.' or start with '$'",
                channel_id
            )));
        }
        let channel = self
            .registry
            .channel(channel_id)
            .await?
            .ok_or_else(|| PublisherError::ChannelNotFound(channel_id.to_string()))?;
        if channel.drive_folder_id.trim().is_empty() {
            return Err(PublisherError::config(format!(
                "channel {} has no Drive folder",
                channel_id
            )));
        }
        if channel.youtube_account.trim().is_empty() {
            return Err(PublisherError::config(format!(
                "channel {} has no YouTube account",
                channel_id
            )));
        }
        Ok(channel)
    }

    async fn select(&self, channel: &Channel, mode: CursorMode) -> Selection {
        let published = self.identifiers.snapshot().await;
        self.selector.select(channel, &published, mode).await
    }

    /// Next unpublished item, advancing the rotation cursor when needed.
    pub async fn get_next_publish(&self, channel_id: &str) -> Result<Option<Item>> {
        let channel = self.channel(channel_id).await?;
        Ok(self.select(&channel, CursorMode::Persist).await.into_item())
    }

    /// Same choice as [`get_next_publish`](Self::get_next_publish), cursor untouched.
    pub async fn preview_next(&self, channel_id: &str) -> Result<Option<Item>> {
        let channel = self.channel(channel_id).await?;
        Ok(self.select(&channel, CursorMode::Preview).await.into_item())
    }

    pub async fn resolve_metadata(
        &self,
        channel_id: &str,
        item: &Item,
        video: &[u8],
    ) -> Result<MetadataResult> {
        let channel = self.channel(channel_id).await?;
        Ok(self.resolver.resolve(&channel, item, video).await)
    }

    pub async fn mark_published(
        &self,
        item_id: &str,
        display_name: &str,
        destination_id: &str,
        destination_url: &str,
        channel_id: &str,
    ) -> PublishedRecord {
        let record = PublishedRecord {
            video_id: item_id.to_string(),
            file_name: display_name.to_string(),
            youtube_id: destination_id.to_string(),
            youtube_url: destination_url.to_string(),
            channel_id: channel_id.to_string(),
            uploaded_at: Utc::now(),
        };
        self.identifiers.record(&record).await;
        record
    }

    pub async fn get_rotation_state(&self, channel_id: &str) -> RotationCursor {
        self.tracker.get_cursor(channel_id).await
    }

    /// Moves the cursor of a known channel.
    pub async fn set_rotation_state(
        &self,
        channel_id: &str,
        index: usize,
        folder_id: &str,
        folder_name: &str,
    ) -> Result<WriteReport> {
        let channel = self.channel(channel_id).await?;
        Ok(self
            .tracker
            .set_cursor(&channel.id, index, folder_id, folder_name)
            .await)
    }

    /// One full publish for one channel. Never fails; every problem ends up
    /// in the returned outcome.
    pub async fn publish_channel(&self, channel_id: &str) -> PublishOutcome {
        let channel = match self.channel(channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!("{}: {}", channel_id, e);
                return PublishOutcome::config_error(channel_id, e.to_string());
            }
        };
        if !channel.enabled {
            return PublishOutcome::config_error(channel_id, "Channel is disabled");
        }

        let Some(item) = self.select(&channel, CursorMode::Persist).await.into_item() else {
            info!("{}: no videos left to upload", channel_id);
            return PublishOutcome::exhausted(channel_id);
        };

        match self.publish_item(&channel, item).await {
            Ok(record) => PublishOutcome::published(channel_id, &record),
            Err(e) => {
                error!("{}: {}", channel_id, e);
                PublishOutcome::failed(channel_id, e.to_string())
            }
        }
    }

    /// Publishes one chosen item to a channel, outside the rotation. The
    /// cursor is left alone and an item already published is refused.
    pub async fn publish_item_by_id(&self, channel_id: &str, item_id: &str) -> PublishOutcome {
        let channel = match self.channel(channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!("{}: {}", channel_id, e);
                return PublishOutcome::config_error(channel_id, e.to_string());
            }
        };
        if !channel.enabled {
            return PublishOutcome::config_error(channel_id, "Channel is disabled");
        }

        let published = self.identifiers.snapshot().await;
        let item = match self.lister.item(item_id, &published).await {
            Ok(item) => item,
            Err(e) => {
                error!("{}: cannot publish {}: {}", channel_id, item_id, e);
                return PublishOutcome::failed(channel_id, e.to_string());
            }
        };
        if item.status == ItemStatus::Published {
            warn!("{}: {} was already published", channel_id, item.name);
            return PublishOutcome::failed(
                channel_id,
                format!("{} was already published", item.name),
            );
        }

        match self.publish_item(&channel, item).await {
            Ok(record) => PublishOutcome::published(channel_id, &record),
            Err(e) => {
                error!("{}: {}", channel_id, e);
                PublishOutcome::failed(channel_id, e.to_string())
            }
        }
    }

    async fn publish_item(&self, channel: &Channel, item: Item) -> Result<PublishedRecord> {
        info!("{}: downloading {}", channel.id, item.name);
        let data = self.lister.source().download(&item.id).await?;
        let metadata = self.resolver.resolve(channel, &item, &data).await;
        info!("{}: publishing \"{}\"", channel.id, metadata.title);

        let video = self
            .publisher
            .publish(
                &channel.youtube_account,
                VideoUpload {
                    data,
                    mime_type: item.mime_type.clone(),
                    file_name: item.name.clone(),
                    metadata,
                    privacy_status: PRIVACY_STATUS.to_string(),
                },
            )
            .await?;

        Ok(self
            .mark_published(&item.id, &item.name, &video.id, &video.url, &channel.id)
            .await)
    }

    /// Publishes one item per enabled channel, one channel at a time. A
    /// channel that fails or panics does not stop the others.
    pub async fn publish_all(self: Arc<Self>) -> Vec<PublishOutcome> {
        let channels = match self.registry.enabled_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                error!("Could not load channels: {}", e);
                return vec![PublishOutcome::config_error("*", e.to_string())];
            }
        };
        info!("Publishing for {} enabled channels", channels.len());

        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in channels {
            let service = Arc::clone(&self);
            let channel_id = channel.id.clone();
            let task = tokio::spawn(async move { service.publish_channel(&channel.id).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{}: publish task aborted: {}", channel_id, e);
                    PublishOutcome::failed(&channel_id, format!("publish task aborted: {}", e))
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// The item a publish would pick and its template metadata. Nothing is
    /// downloaded, uploaded or persisted.
    pub async fn dry_run(&self, channel_id: &str) -> Result<DryRunReport> {
        let channel = self.channel(channel_id).await?;
        let item = self.select(&channel, CursorMode::Preview).await.into_item();
        let metadata = item
            .as_ref()
            .map(|item| clamp(template_metadata(&channel, item)));
        Ok(DryRunReport {
            channel_id: channel_id.to_string(),
            item,
            metadata,
        })
    }

    /// Folders a channel draws from: its subfolders, or the root when it has none.
    async fn pool_folders(&self, channel: &Channel) -> (usize, Vec<String>) {
        let subfolders = self.lister.list_subfolders(&channel.drive_folder_id).await;
        if subfolders.is_empty() {
            (0, vec![channel.drive_folder_id.clone()])
        } else {
            (
                subfolders.len(),
                subfolders.into_iter().map(|folder| folder.id).collect(),
            )
        }
    }

    /// Every video of the channel with its publish status, in rotation order.
    pub async fn list_videos(&self, channel_id: &str, limit: Option<usize>) -> Result<Vec<Item>> {
        let channel = self.channel(channel_id).await?;
        let published = self.identifiers.snapshot().await;
        let (_, folders) = self.pool_folders(&channel).await;

        let mut items = Vec::new();
        for folder_id in folders {
            items.extend(self.lister.list_all_items(&folder_id, &published).await);
            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    pub async fn channel_stats(&self, channel_id: &str) -> Result<ChannelStats> {
        let channel = self.channel(channel_id).await?;
        let published = self.identifiers.snapshot().await;
        let (subfolders, folders) = self.pool_folders(&channel).await;

        let mut stats = ChannelStats {
            channel_id: channel_id.to_string(),
            subfolders,
            total: 0,
            published: 0,
            pending: 0,
        };
        for folder_id in folders {
            for item in self.lister.list_all_items(&folder_id, &published).await {
                stats.total += 1;
                match item.status {
                    ItemStatus::Published => stats.published += 1,
                    ItemStatus::Pending => stats.pending += 1,
                }
            }
        }
        Ok(stats)
    }

    /// Past publishes, newest first, optionally for one channel.
    pub async fn history(
        &self,
        channel_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PublishedRecord>> {
        self.identifiers.history(channel_id, limit).await
    }

    pub async fn clear_channel(&self, channel_id: &str) -> Result<u64> {
        self.identifiers.clear_channel(channel_id).await
    }

    pub async fn clear_all(&self) -> Result<u64> {
        self.identifiers.clear_all().await
    }
}
