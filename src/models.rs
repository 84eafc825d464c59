use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Published,
}

/// A video found in the source folder tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub mime_type: String,
    pub folder_id: String,
    pub created_time: Option<DateTime<Utc>>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPolicy {
    #[serde(default = "default_enabled")]
    pub use_ai_metadata: bool,
    #[serde(default = "default_title_template")]
    pub title_template: String,
    #[serde(default = "default_description_template")]
    pub description_template: String,
    #[serde(default)]
    pub default_tags: Vec<String>,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    /// Content categories handed to AI providers as a hint.
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_title_template() -> String {
    "{trending_title}".to_string()
}

fn default_description_template() -> String {
    "{trending_description}".to_string()
}

fn default_category_id() -> String {
    "22".to_string()
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            use_ai_metadata: true,
            title_template: default_title_template(),
            description_template: default_description_template(),
            default_tags: Vec::new(),
            category_id: default_category_id(),
            categories: Vec::new(),
        }
    }
}

/// A publishing target: one source folder tree, one destination account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub drive_folder_id: String,
    pub youtube_account: String,
    #[serde(default)]
    pub policy: MetadataPolicy,
}

fn default_enabled() -> bool {
    true
}

/// Per-channel pointer to the subfolder tried first on the next selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCursor {
    pub current_index: usize,
    pub current_folder_id: Option<String>,
    pub current_folder_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for RotationCursor {
    fn default() -> Self {
        Self {
            current_index: 0,
            current_folder_id: None,
            current_folder_name: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub video_id: String,
    pub file_name: String,
    pub youtube_id: String,
    pub youtube_url: String,
    pub channel_id: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Everything already published, read once per invocation.
#[derive(Debug, Clone, Default)]
pub struct PublishedSet {
    ids: HashSet<String>,
    names: HashSet<String>,
    names_available: bool,
}

impl PublishedSet {
    pub fn new() -> Self {
        Self {
            names_available: true,
            ..Self::default()
        }
    }

    /// A set built from the bare id list of the local tier.
    pub fn ids_only<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            names: HashSet::new(),
            names_available: false,
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, name: Option<&str>) {
        self.ids.insert(id.into());
        if let Some(name) = name {
            self.names.insert(name.to_lowercase());
        }
    }

    pub fn extend_ids<I: IntoIterator<Item = String>>(&mut self, ids: I) {
        self.ids.extend(ids);
    }

    pub fn contains(&self, id: &str, name: &str) -> bool {
        self.ids.contains(id) || self.names.contains(&name.to_lowercase())
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// False when the set came from the local tier, which stores ids only.
    pub fn names_available(&self) -> bool {
        self.names_available
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Ai,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataResult {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub source: MetadataSource,
    /// Name of the AI provider that produced the metadata, if any.
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Published,
    Exhausted,
    ConfigError,
    Failed,
}

/// Result of one publish attempt for one channel, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    pub status: OutcomeStatus,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "youtubeUrl", skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(rename = "uploadedAt", skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl PublishOutcome {
    fn negative(channel_id: &str, status: OutcomeStatus, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            channel_id: channel_id.to_string(),
            error: Some(reason.into()),
            video_id: None,
            file_name: None,
            youtube_url: None,
            uploaded_at: None,
        }
    }

    pub fn published(channel_id: &str, record: &PublishedRecord) -> Self {
        Self {
            success: true,
            status: OutcomeStatus::Published,
            channel_id: channel_id.to_string(),
            error: None,
            video_id: Some(record.youtube_id.clone()),
            file_name: Some(record.file_name.clone()),
            youtube_url: Some(record.youtube_url.clone()),
            uploaded_at: Some(record.uploaded_at),
        }
    }

    pub fn exhausted(channel_id: &str) -> Self {
        Self::negative(channel_id, OutcomeStatus::Exhausted, "No videos left to upload")
    }

    pub fn config_error(channel_id: &str, reason: impl Into<String>) -> Self {
        Self::negative(channel_id, OutcomeStatus::ConfigError, reason)
    }

    pub fn failed(channel_id: &str, reason: impl Into<String>) -> Self {
        Self::negative(channel_id, OutcomeStatus::Failed, reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel_id: String,
    pub subfolders: usize,
    pub total: usize,
    pub published: usize,
    pub pending: usize,
}
