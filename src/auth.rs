use crate::config::GoogleConfig;
use crate::error::{PublisherError, Result};
use crate::store::LocalJson;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthUrl, ClientId, ClientSecret, RefreshToken, TokenResponse, TokenUrl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Supplies a valid access token for a named account.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self, account: &str) -> Result<String>;
}

/// Token file contents. Also accepts the field names written by Google's
/// Python client (`token`, `expiry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at > now + Duration::minutes(5))
    }
}

/// Per-account token files `token_<account>.json`, refreshed on demand.
pub struct TokenStore {
    dir: PathBuf,
    oauth_client: Option<BasicClient>,
    cache: Mutex<HashMap<String, String>>,
}

impl TokenStore {
    pub fn new(dir: &Path, google: &GoogleConfig) -> Result<Self> {
        let oauth_client = if google.client_id.is_empty() {
            None
        } else {
            Some(BasicClient::new(
                ClientId::new(google.client_id.clone()),
                Some(ClientSecret::new(google.client_secret.clone())),
                AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?,
                Some(TokenUrl::new(google.token_url.clone())?),
            ))
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            oauth_client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn token_file(&self, account: &str) -> LocalJson<StoredTokens> {
        LocalJson::new(self.dir.join(format!("token_{}.json", account)))
    }

    fn cached(&self, account: &str) -> Option<String> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(account).cloned())
    }

    fn remember(&self, account: &str, token: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(account.to_string(), token.to_string());
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredTokens> {
        let client = self.oauth_client.as_ref().ok_or_else(|| {
            PublisherError::Auth("token expired and no OAuth client is configured".to_string())
        })?;
        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| PublisherError::Auth(format!("refresh failed: {}", e)))?;

        let expires_at = token_result
            .expires_in()
            .map(|duration| Utc::now() + Duration::seconds(duration.as_secs() as i64));

        Ok(StoredTokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialProvider for TokenStore {
    async fn access_token(&self, account: &str) -> Result<String> {
        if let Some(token) = self.cached(account) {
            return Ok(token);
        }

        let file = self.token_file(account);
        let tokens = file.load()?.ok_or_else(|| {
            PublisherError::Auth(format!(
                "no token file for account '{}' at {}",
                account,
                file.path().display()
            ))
        })?;

        if tokens.is_fresh(Utc::now()) {
            debug!("Using existing valid token for {}", account);
            self.remember(account, &tokens.access_token);
            return Ok(tokens.access_token);
        }

        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            PublisherError::Auth(format!("token for '{}' expired and cannot be refreshed", account))
        })?;
        let refreshed = self.refresh(refresh_token).await?;
        file.save(&refreshed)?;
        info!("Refreshed access token for {}", account);

        self.remember(account, &refreshed.access_token);
        Ok(refreshed.access_token)
    }
}
