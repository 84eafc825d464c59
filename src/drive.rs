//! Source folder tree: the Google Drive client and the paginating lister on top of it.

use crate::auth::CredentialProvider;
use crate::error::{PublisherError, Result};
use crate::models::{Item, ItemStatus, PublishedSet, Subfolder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const FOLDER_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Video,
}

impl EntryKind {
    pub fn accepts(&self, mime_type: &str) -> bool {
        match self {
            EntryKind::Folder => mime_type == FOLDER_MIME_TYPE,
            EntryKind::Video => mime_type.starts_with("video/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub parent_id: String,
    pub kind: EntryKind,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Drive reports sizes as decimal strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub files: Vec<SourceEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A folder tree of videos.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// One page of children of `query.parent_id`, in source order
    /// (folders by name, videos by creation time).
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<ListPage>;

    /// A single file looked up by id, wherever it lives.
    async fn entry(&self, item_id: &str) -> Result<SourceEntry>;

    async fn download(&self, item_id: &str) -> Result<Vec<u8>>;
}

/// Google Drive v3 REST client.
pub struct DriveClient {
    client: Client,
    api_base: Url,
    credentials: Arc<dyn CredentialProvider>,
    account: String,
    list_timeout: Option<Duration>,
}

impl DriveClient {
    pub fn new(
        client: Client,
        api_base: &str,
        credentials: Arc<dyn CredentialProvider>,
        account: &str,
    ) -> Result<Self> {
        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
            credentials,
            account: account.to_string(),
            list_timeout: None,
        })
    }

    /// Bounds each listing request; downloads are left unbounded.
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = Some(timeout);
        self
    }

    fn files_url(&self) -> Url {
        let mut url = self.api_base.clone();
        url.set_path("/drive/v3/files");
        url
    }

    fn file_url(&self, item_id: &str) -> Result<Url> {
        let mut url = self.files_url();
        url.path_segments_mut()
            .map_err(|_| PublisherError::config("Drive API base cannot hold a path"))?
            .push(item_id);
        Ok(url)
    }

    fn search_query(query: &ListQuery) -> String {
        let parent = query.parent_id.replace('\\', "\\\\").replace('\'', "\\'");
        match query.kind {
            EntryKind::Folder => format!(
                "'{}' in parents and mimeType = '{}' and trashed = false",
                parent, FOLDER_MIME_TYPE
            ),
            EntryKind::Video => format!(
                "'{}' in parents and mimeType contains 'video/' and trashed = false",
                parent
            ),
        }
    }
}

#[async_trait]
impl ContentSource for DriveClient {
    async fn list_page(&self, query: &ListQuery, page_token: Option<&str>) -> Result<ListPage> {
        let token = self.credentials.access_token(&self.account).await?;
        let order_by = match query.kind {
            EntryKind::Folder => "name",
            EntryKind::Video => "createdTime",
        };
        let page_size = query.page_size.to_string();
        let q = Self::search_query(query);

        let mut params = vec![
            ("q", q.as_str()),
            ("orderBy", order_by),
            ("pageSize", page_size.as_str()),
            (
                "fields",
                "nextPageToken, files(id, name, mimeType, size, createdTime, trashed)",
            ),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let mut request = self.client.get(self.files_url()).query(&params).bearer_auth(token);
        if let Some(timeout) = self.list_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PublisherError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn entry(&self, item_id: &str) -> Result<SourceEntry> {
        let token = self.credentials.access_token(&self.account).await?;
        let mut request = self
            .client
            .get(self.file_url(item_id)?)
            .query(&[
                ("fields", "id, name, mimeType, size, createdTime, trashed, parents"),
                ("supportsAllDrives", "true"),
            ])
            .bearer_auth(token);
        if let Some(timeout) = self.list_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PublisherError::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn download(&self, item_id: &str) -> Result<Vec<u8>> {
        let token = self.credentials.access_token(&self.account).await?;
        let response = self
            .client
            .get(self.file_url(item_id)?)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublisherError::from_response(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Lists subfolders and pending videos, hiding pagination and listing errors.
pub struct FolderLister {
    source: Arc<dyn ContentSource>,
    page_size: u32,
}

impl FolderLister {
    pub fn new(source: Arc<dyn ContentSource>, page_size: u32) -> Self {
        Self { source, page_size }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Walks every page, keeping entries of the query's kind that `keep`
    /// accepts, until `limit` entries are kept or the pages run out.
    async fn collect<F>(
        &self,
        query: &ListQuery,
        limit: Option<usize>,
        mut keep: F,
    ) -> Result<Vec<SourceEntry>>
    where
        F: FnMut(&SourceEntry) -> bool + Send,
    {
        let mut kept = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.source.list_page(query, page_token.as_deref()).await?;
            for entry in page.files {
                if entry.trashed || !query.kind.accepts(&entry.mime_type) || !keep(&entry) {
                    continue;
                }
                kept.push(entry);
                if limit.is_some_and(|limit| kept.len() >= limit) {
                    return Ok(kept);
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(PublisherError::store(format!(
                            "listing of {} repeated page token {}",
                            query.parent_id, token
                        )));
                    }
                    debug!("Fetched {} entries of {} so far", kept.len(), query.parent_id);
                    page_token = Some(token);
                }
                _ => return Ok(kept),
            }
        }
    }

    /// Child folders sorted by name. Empty on any listing error.
    pub async fn list_subfolders(&self, folder_id: &str) -> Vec<Subfolder> {
        let query = ListQuery {
            parent_id: folder_id.to_string(),
            kind: EntryKind::Folder,
            page_size: FOLDER_PAGE_SIZE,
        };
        match self.collect(&query, None, |_| true).await {
            Ok(entries) => {
                let mut folders: Vec<Subfolder> = entries
                    .into_iter()
                    .map(|entry| Subfolder {
                        id: entry.id,
                        name: entry.name,
                    })
                    .collect();
                folders.sort_by(|a, b| a.name.cmp(&b.name));
                folders
            }
            Err(e) => {
                warn!("Failed to list subfolders of {}: {}", folder_id, e);
                Vec::new()
            }
        }
    }

    /// Unpublished videos of one folder, oldest first, at most `limit`.
    /// Empty on any listing error.
    pub async fn list_items(
        &self,
        folder_id: &str,
        published: &PublishedSet,
        limit: Option<usize>,
    ) -> Vec<Item> {
        let query = self.item_query(folder_id);
        match self
            .collect(&query, limit, |entry| !published.contains(&entry.id, &entry.name))
            .await
        {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| to_item(entry, folder_id, ItemStatus::Pending))
                .collect(),
            Err(e) => {
                warn!("Failed to list videos of {}: {}", folder_id, e);
                Vec::new()
            }
        }
    }

    /// Every video of one folder with its publish status.
    pub async fn list_all_items(&self, folder_id: &str, published: &PublishedSet) -> Vec<Item> {
        let query = self.item_query(folder_id);
        match self.collect(&query, None, |_| true).await {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| {
                    let status = if published.contains(&entry.id, &entry.name) {
                        ItemStatus::Published
                    } else {
                        ItemStatus::Pending
                    };
                    to_item(entry, folder_id, status)
                })
                .collect(),
            Err(e) => {
                warn!("Failed to list videos of {}: {}", folder_id, e);
                Vec::new()
            }
        }
    }

    /// One video by id with its publish status. Unlike the listings, errors
    /// are returned: the caller asked for this exact item.
    pub async fn item(&self, item_id: &str, published: &PublishedSet) -> Result<Item> {
        let entry = self.source.entry(item_id).await?;
        if entry.trashed {
            return Err(PublisherError::config(format!("{} is in the trash", item_id)));
        }
        if !EntryKind::Video.accepts(&entry.mime_type) {
            return Err(PublisherError::config(format!(
                "{} is not a video ({})",
                item_id, entry.mime_type
            )));
        }
        let status = if published.contains(&entry.id, &entry.name) {
            ItemStatus::Published
        } else {
            ItemStatus::Pending
        };
        let folder_id = entry.parents.first().cloned().unwrap_or_default();
        Ok(to_item(entry, &folder_id, status))
    }

    fn item_query(&self, folder_id: &str) -> ListQuery {
        ListQuery {
            parent_id: folder_id.to_string(),
            kind: EntryKind::Video,
            page_size: self.page_size,
        }
    }
}

fn to_item(entry: SourceEntry, folder_id: &str, status: ItemStatus) -> Item {
    Item {
        size: entry.size.as_deref().and_then(|s| s.parse().ok()),
        id: entry.id,
        name: entry.name,
        mime_type: entry.mime_type,
        folder_id: folder_id.to_string(),
        created_time: entry.created_time,
        status,
    }
}

/// Pulls the folder id out of a Drive folder URL; plain ids pass through.
pub fn extract_folder_id(url_or_id: &str) -> String {
    let trimmed = url_or_id.trim();
    if !trimmed.contains("drive.google.com") {
        return trimmed.to_string();
    }
    match trimmed.split_once("/folders/") {
        Some((_, rest)) => rest
            .split(['?', '/', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_urls_reduce_to_ids() {
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/folders/1AbC_d-9?usp=sharing"),
            "1AbC_d-9"
        );
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/u/0/folders/XYZ/"),
            "XYZ"
        );
        assert_eq!(extract_folder_id(" 1AbC "), "1AbC");
    }

    #[test]
    fn search_query_escapes_quotes() {
        let query = ListQuery {
            parent_id: "a'b".to_string(),
            kind: EntryKind::Video,
            page_size: 10,
        };
        assert_eq!(
            DriveClient::search_query(&query),
            "'a\\'b' in parents and mimeType contains 'video/' and trashed = false"
        );
    }

    #[test]
    fn kinds_filter_by_mime_type() {
        assert!(EntryKind::Folder.accepts(FOLDER_MIME_TYPE));
        assert!(!EntryKind::Folder.accepts("video/mp4"));
        assert!(EntryKind::Video.accepts("video/quicktime"));
        assert!(!EntryKind::Video.accepts("image/png"));
    }
}
