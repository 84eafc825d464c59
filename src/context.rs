//! Everything one invocation needs, built once from the loaded config.

use crate::auth::{CredentialProvider, TokenStore};
use crate::channels::ChannelDirectory;
use crate::config::AppConfig;
use crate::drive::DriveClient;
use crate::error::Result;
use crate::identifiers::IdentifierStore;
use crate::metadata::MetadataResolver;
use crate::providers;
use crate::rotation::RotationTracker;
use crate::service::{PublisherService, ServiceParts};
use crate::store::{DataApiStore, DocumentStore, MemoryStore};
use crate::youtube::YouTubeUploader;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound for one AI analysis call; video inference is slow.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(180);

pub struct RunContext {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    /// Client for remote store calls, bounded by `remote_timeout`.
    pub store_http: Client,
    /// Client for Drive, YouTube and AI calls; only connecting is bounded.
    pub http: Client,
    pub remote: Option<Arc<dyn DocumentStore>>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl RunContext {
    /// With `offline` set, the remote tier is replaced by one that always
    /// fails, so every read and write goes to the local files.
    pub fn new(config: AppConfig, offline: bool) -> Result<Self> {
        let timeout = config.timeout()?;
        let store_http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        let http = Client::builder().connect_timeout(timeout).build()?;

        let remote: Option<Arc<dyn DocumentStore>> = if offline {
            info!("Offline mode: using local files only");
            Some(Arc::new(MemoryStore::offline()))
        } else {
            match &config.remote_store {
                Some(store) => Some(Arc::new(DataApiStore::new(store_http.clone(), store))),
                None => {
                    warn!("No remote store configured; state is kept in local files only");
                    None
                }
            }
        };

        let data_dir = config.data_dir();
        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(TokenStore::new(&data_dir, &config.google)?);

        Ok(Self {
            config,
            data_dir,
            store_http,
            http,
            remote,
            credentials,
        })
    }

    pub fn build_service(&self) -> Result<PublisherService> {
        let timeout = self.config.timeout()?;
        let drive = DriveClient::new(
            self.http.clone(),
            &self.config.drive_api_base,
            self.credentials.clone(),
            &self.config.drive_account,
        )?
        .with_list_timeout(timeout);

        let analysis_http = Client::builder()
            .timeout(ANALYSIS_TIMEOUT)
            .connect_timeout(timeout)
            .build()?;
        let resolver = MetadataResolver::new(providers::from_config(
            &analysis_http,
            &self.config.gemini,
        ));
        info!("Metadata providers: {:?}", resolver.provider_names());

        Ok(PublisherService::new(ServiceParts {
            registry: Arc::new(ChannelDirectory::new(self.remote.clone(), &self.data_dir)),
            identifiers: Arc::new(IdentifierStore::new(self.remote.clone(), &self.data_dir)),
            tracker: Arc::new(RotationTracker::new(self.remote.clone(), &self.data_dir)),
            source: Arc::new(drive),
            item_page_size: self.config.item_page_size,
            resolver,
            publisher: Arc::new(YouTubeUploader::new(
                self.http.clone(),
                &self.config.youtube_api_base,
                self.credentials.clone(),
            )),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_context_has_failing_remote() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        let context = RunContext::new(config, true).unwrap();

        let remote = context.remote.clone().unwrap();
        assert!(remote.find("channels", serde_json::json!({}), None).await.is_err());
        assert_eq!(context.data_dir, dir.path());
        assert!(context.build_service().is_ok());
    }

    #[test]
    fn no_remote_store_means_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        let context = RunContext::new(config, false).unwrap();
        assert!(context.remote.is_none());
    }
}
