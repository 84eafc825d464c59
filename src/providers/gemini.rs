use crate::metadata::{AnalysisOutcome, AnalysisRequest, GeneratedMetadata, MetadataProvider};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

/// Largest video sent inline; bigger files would need the upload API.
pub const MAX_INLINE_BYTES: usize = 20 * 1024 * 1024;

/// One Gemini model behind `generateContent`.
pub struct GeminiProvider {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    name: String,
}

impl GeminiProvider {
    pub fn new(client: Client, api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            name: format!("gemini/{}", model),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

/// Pulls the JSON object out of a model reply, tolerating markdown fences.
fn parse_reply(text: &str) -> Option<GeneratedMetadata> {
    let trimmed = text.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn reply_text(body: &Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
}

#[async_trait]
impl MetadataProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> AnalysisOutcome {
        if request.video.len() > MAX_INLINE_BYTES {
            return AnalysisOutcome::Failed(format!(
                "video is {} bytes, above the inline limit",
                request.video.len()
            ));
        }

        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": request.mime_type,
                            "data": STANDARD.encode(request.video),
                        }
                    },
                    { "text": request.prompt },
                ]
            }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        debug!("Asking {} for metadata", self.name);
        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AnalysisOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return AnalysisOutcome::Failed(e.to_string()),
        };
        if status == StatusCode::TOO_MANY_REQUESTS || text.contains("RESOURCE_EXHAUSTED") {
            return AnalysisOutcome::QuotaExceeded(format!("status {}", status.as_u16()));
        }
        if !status.is_success() {
            return AnalysisOutcome::Failed(format!("status {}: {}", status.as_u16(), text));
        }

        let parsed = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| reply_text(&body).and_then(parse_reply));
        match parsed {
            Some(metadata) => AnalysisOutcome::Success(metadata),
            None => AnalysisOutcome::Failed("reply did not contain metadata JSON".to_string()),
        }
    }
}
