//! HTTP clients against mock servers: Data API store, Drive, Gemini, YouTube and token refresh.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use drive_publisher::auth::{CredentialProvider, StoredTokens, TokenStore};
use drive_publisher::config::{GoogleConfig, RemoteStoreConfig};
use drive_publisher::drive::{ContentSource, DriveClient, FolderLister};
use drive_publisher::identifiers::IdentifierStore;
use drive_publisher::metadata::{AnalysisOutcome, AnalysisRequest, MetadataProvider};
use drive_publisher::models::{MetadataResult, MetadataSource, PublishedSet};
use drive_publisher::providers::GeminiProvider;
use drive_publisher::store::{DataApiStore, DocumentStore, LocalJson};
use drive_publisher::youtube::{VideoPublisher, VideoUpload, YouTubeUploader};
use drive_publisher::PublisherError;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct StaticToken;

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self, account: &str) -> drive_publisher::Result<String> {
        Ok(format!("token-{}", account))
    }
}

fn store_config(server: &MockServer) -> RemoteStoreConfig {
    RemoteStoreConfig {
        endpoint: format!("{}/app/data-abc/endpoint/data/v1", server.uri()),
        api_key: "secret".to_string(),
        data_source: "Cluster0".to_string(),
        database: "yt_automation".to_string(),
    }
}

#[tokio::test]
async fn test_data_api_find_sends_key_and_namespace() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/data-abc/endpoint/data/v1/action/find"))
        .and(header("api-key", "secret"))
        .and(body_partial_json(json!({
            "dataSource": "Cluster0",
            "database": "yt_automation",
            "collection": "uploaded_videos",
            "projection": { "video_id": 1, "file_name": 1 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                { "video_id": "abc", "file_name": "Clip.mp4" },
                { "video_id": "def", "file_name": "other.mp4" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let store = DataApiStore::new(Client::new(), &store_config(&mock_server));
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(store) as Arc<dyn DocumentStore>;
    let identifiers = IdentifierStore::new(Some(remote), dir.path());

    let published = identifiers.snapshot().await;
    assert_eq!(published.len(), 2);
    assert!(published.names_available());
    assert!(published.contains("new-id", "clip.mp4"));
}

/// Serves `count` published records the way Atlas pages `find`: `limit`
/// defaults to and is capped at 1000, `skip` is honoured.
struct PagedRecords {
    count: usize,
}

impl Respond for PagedRecords {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = request.body_json().unwrap_or_default();
        let skip = body["skip"].as_u64().unwrap_or(0) as usize;
        let limit = body["limit"].as_u64().unwrap_or(1000).min(1000) as usize;
        let documents: Vec<_> = (skip..self.count.min(skip + limit))
            .map(|i| {
                json!({ "video_id": format!("id-{}", i), "file_name": format!("f{}.mp4", i) })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "documents": documents }))
    }
}

#[tokio::test]
async fn test_data_api_find_reads_past_the_default_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/data-abc/endpoint/data/v1/action/find"))
        .and(body_partial_json(json!({ "sort": { "_id": 1 } })))
        .respond_with(PagedRecords { count: 1500 })
        .mount(&mock_server)
        .await;

    let store = DataApiStore::new(Client::new(), &store_config(&mock_server));
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(store) as Arc<dyn DocumentStore>;
    let identifiers = IdentifierStore::new(Some(remote), dir.path());

    let published = identifiers.snapshot().await;
    assert_eq!(published.len(), 1500);
    assert!(published.contains_id("id-1499"));
    assert!(published.contains("re-uploaded", "F1499.mp4"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_data_api_find_stops_on_exact_page_boundary() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/data-abc/endpoint/data/v1/action/find"))
        .respond_with(PagedRecords { count: 4 })
        .mount(&mock_server)
        .await;

    let store = DataApiStore::new(Client::new(), &store_config(&mock_server)).with_page_size(2);
    let documents = store.find("uploaded_videos", json!({}), None).await.unwrap();

    assert_eq!(documents.len(), 4);
    assert_eq!(documents[3]["video_id"], "id-3");
    // Two full pages, then an empty one.
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_data_api_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/data-abc/endpoint/data/v1/action/deleteMany"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid session"))
        .mount(&mock_server)
        .await;

    let store = DataApiStore::new(Client::new(), &store_config(&mock_server));
    let err = store
        .delete_many("uploaded_videos", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, PublisherError::Remote { status: 401, .. }));
}

#[tokio::test]
async fn test_slow_store_falls_back_to_local_ids() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "documents": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let store = DataApiStore::new(client, &store_config(&mock_server));
    let dir = tempfile::tempdir().unwrap();
    LocalJson::new(dir.path().join("uploaded_videos.json"))
        .save(&vec!["local-id".to_string()])
        .unwrap();
    let remote = Arc::new(store) as Arc<dyn DocumentStore>;
    let identifiers = IdentifierStore::new(Some(remote), dir.path());

    let published = identifiers.snapshot().await;
    assert!(!published.names_available());
    assert!(published.contains_id("local-id"));
}

fn drive_client(server: &MockServer) -> DriveClient {
    DriveClient::new(Client::new(), &server.uri(), Arc::new(StaticToken), "drive").unwrap()
}

#[tokio::test]
async fn test_drive_listing_follows_page_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param_is_missing("pageToken"))
        .and(query_param("orderBy", "createdTime"))
        .and(header("authorization", "Bearer token-drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "v1", "name": "one.mp4", "mimeType": "video/mp4", "size": "2048",
                  "createdTime": "2024-01-01T10:00:00Z" },
                { "id": "v2", "name": "two.mp4", "mimeType": "video/mp4", "trashed": true }
            ],
            "nextPageToken": "p2"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                { "id": "v3", "name": "three.mp4", "mimeType": "video/mp4" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let drive = drive_client(&mock_server).with_list_timeout(Duration::from_secs(5));
    let lister = FolderLister::new(Arc::new(drive), 2);

    let items = lister.list_items("root", &PublishedSet::new(), None).await;
    let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v3"]);
    assert_eq!(items[0].size, Some(2048));
    assert_eq!(items[0].folder_id, "root");
}

#[tokio::test]
async fn test_drive_listing_error_reads_as_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
        .mount(&mock_server)
        .await;

    let drive = drive_client(&mock_server);
    let lister = FolderLister::new(Arc::new(drive), 100);

    assert!(lister.list_subfolders("gone").await.is_empty());
    assert!(lister.list_items("gone", &PublishedSet::new(), Some(1)).await.is_empty());
}

#[tokio::test]
async fn test_drive_download_fetches_media() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/abc"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let drive = drive_client(&mock_server);

    assert_eq!(drive.download("abc").await.unwrap(), b"video-bytes".to_vec());
}

fn request() -> AnalysisRequest<'static> {
    AnalysisRequest {
        video: b"video",
        mime_type: "video/mp4",
        prompt: "Describe".to_string(),
    }
}

#[tokio::test]
async fn test_gemini_rate_limit_is_quota_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&mock_server)
        .await;

    let provider =
        GeminiProvider::new(Client::new(), &mock_server.uri(), "key", "gemini-2.0-flash");

    assert_eq!(provider.name(), "gemini/gemini-2.0-flash");
    assert!(matches!(
        provider.analyze(&request()).await,
        AnalysisOutcome::QuotaExceeded(_)
    ));
}

#[tokio::test]
async fn test_gemini_reply_becomes_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{
                    "text": json!({
                        "title": "Wave rider #Shorts",
                        "description": "Big surf.",
                        "tags": ["surf"]
                    })
                    .to_string()
                }] }
            }]
        })))
        .mount(&mock_server)
        .await;

    let provider =
        GeminiProvider::new(Client::new(), &mock_server.uri(), "key", "gemini-1.5-flash");

    match provider.analyze(&request()).await {
        AnalysisOutcome::Success(metadata) => {
            assert_eq!(metadata.title, "Wave rider #Shorts");
            assert_eq!(metadata.tags, vec!["surf"]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn upload() -> VideoUpload {
    VideoUpload {
        data: b"video".to_vec(),
        mime_type: "video/mp4".to_string(),
        file_name: "clip.mp4".to_string(),
        metadata: MetadataResult {
            title: "Clip #Shorts".to_string(),
            description: "Clip".to_string(),
            tags: vec!["shorts".to_string()],
            category_id: "22".to_string(),
            source: MetadataSource::Template,
            provider: None,
        },
        privacy_status: "public".to_string(),
    }
}

#[tokio::test]
async fn test_youtube_upload_returns_shorts_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .and(query_param("uploadType", "multipart"))
        .and(header("authorization", "Bearer token-account1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "dQw4w9" })))
        .mount(&mock_server)
        .await;

    let uploader = YouTubeUploader::new(Client::new(), &mock_server.uri(), Arc::new(StaticToken));
    let video = uploader.publish("account1", upload()).await.unwrap();

    assert_eq!(video.id, "dQw4w9");
    assert_eq!(video.url, "https://www.youtube.com/shorts/dQw4w9");
}

#[tokio::test]
async fn test_youtube_rejection_is_upload_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .mount(&mock_server)
        .await;

    let uploader = YouTubeUploader::new(Client::new(), &mock_server.uri(), Arc::new(StaticToken));
    let err = uploader.publish("account1", upload()).await.unwrap_err();

    match err {
        PublisherError::Upload(message) => assert!(message.contains("quotaExceeded")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.new",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_file = LocalJson::<StoredTokens>::new(dir.path().join("token_account1.json"));
    token_file
        .save(&StoredTokens {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(Utc::now() - ChronoDuration::hours(1)),
        })
        .unwrap();

    let google = GoogleConfig {
        client_id: "client".to_string(),
        client_secret: "shh".to_string(),
        token_url: format!("{}/token", mock_server.uri()),
    };
    let store = TokenStore::new(dir.path(), &google).unwrap();

    assert_eq!(store.access_token("account1").await.unwrap(), "ya29.new");
    let saved = token_file.load().unwrap().unwrap();
    assert_eq!(saved.access_token, "ya29.new");
    assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));
}
