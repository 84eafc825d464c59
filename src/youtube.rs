use crate::auth::CredentialProvider;
use crate::error::{PublisherError, Result};
use crate::models::MetadataResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub const SHORTS_URL_BASE: &str = "https://www.youtube.com/shorts/";

#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub metadata: MetadataResult,
    pub privacy_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedVideo {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
}

/// Destination platform.
#[async_trait]
pub trait VideoPublisher: Send + Sync {
    async fn publish(&self, account: &str, upload: VideoUpload) -> Result<PublishedVideo>;
}

pub struct YouTubeUploader {
    client: Client,
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl YouTubeUploader {
    pub fn new(client: Client, api_base: &str, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }
}

#[async_trait]
impl VideoPublisher for YouTubeUploader {
    async fn publish(&self, account: &str, upload: VideoUpload) -> Result<PublishedVideo> {
        let access_token = self.credentials.access_token(account).await?;
        let metadata = &upload.metadata;

        let metadata_json = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": metadata.category_id
            },
            "status": {
                "privacyStatus": upload.privacy_status,
                "selfDeclaredMadeForKids": false
            }
        });

        let form = reqwest::multipart::Form::new()
            .part(
                "snippet",
                reqwest::multipart::Part::text(metadata_json.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "media",
                reqwest::multipart::Part::bytes(upload.data)
                    .file_name(upload.file_name.clone())
                    .mime_str(&upload.mime_type)?,
            );

        info!("Uploading {} to account {}", upload.file_name, account);
        let response = self
            .client
            .post(format!("{}/upload/youtube/v3/videos", self.api_base))
            .query(&[("part", "snippet,status"), ("uploadType", "multipart")])
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?;

        if response.status().is_success() {
            let upload_response: UploadResponse = response.json().await?;
            Ok(PublishedVideo {
                url: format!("{}{}", SHORTS_URL_BASE, upload_response.id),
                id: upload_response.id,
            })
        } else {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            Err(PublisherError::Upload(format!(
                "status {}: {}",
                status, error_text
            )))
        }
    }
}
