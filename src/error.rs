use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublisherError>;

#[derive(Error, Debug)]
pub enum PublisherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Non-success status returned by a remote API.
    #[error("Remote call failed with status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Document store error: {0}")]
    Store(String),
}

impl PublisherError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Builds a `Remote` error from a failed response, consuming its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Remote { status, body }
    }
}
