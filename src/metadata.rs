//! Title, description and tags for an upload: AI providers first, channel templates otherwise.

use crate::models::{Channel, Item, MetadataResult, MetadataSource};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_TAGS: usize = 15;
pub const MAX_TAGS_TOTAL_CHARS: usize = 500;

const DERIVED_TITLE_CHARS: usize = 55;
const TITLE_SUFFIX: &str = " #Shorts";
const DESCRIPTION_HASHTAGS: &str = "#shorts #viral #trending";
const FALLBACK_NAME: &str = "Amazing Video";
const CONTENT_PLACEHOLDERS: [&str; 2] = ["{trending_title}", "{trending_description}"];
const DEFAULT_TAGS: [&str; 3] = ["shorts", "viral", "trending"];

/// What an AI provider produced for a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(GeneratedMetadata),
    /// The provider refused because of quota or rate limits.
    QuotaExceeded(String),
    Failed(String),
}

/// Input handed to each provider.
pub struct AnalysisRequest<'a> {
    pub video: &'a [u8],
    pub mime_type: &'a str,
    pub prompt: String,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> AnalysisOutcome;
}

pub struct MetadataResolver {
    providers: Vec<Box<dyn MetadataProvider>>,
}

impl MetadataResolver {
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    pub fn templates_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Each provider is asked once, in order; the first usable answer wins.
    /// Whatever the source, the result is clamped to YouTube's limits.
    pub async fn resolve(&self, channel: &Channel, item: &Item, video: &[u8]) -> MetadataResult {
        if channel.policy.use_ai_metadata && !self.providers.is_empty() {
            let request = AnalysisRequest {
                video,
                mime_type: &item.mime_type,
                prompt: build_prompt(channel, item),
            };
            for provider in &self.providers {
                match provider.analyze(&request).await {
                    AnalysisOutcome::Success(generated)
                        if !clean_text(&generated.title).is_empty() =>
                    {
                        info!(
                            "{}: metadata for {} from {}",
                            channel.id,
                            item.name,
                            provider.name()
                        );
                        return clamp(MetadataResult {
                            title: generated.title,
                            description: generated.description,
                            tags: if generated.tags.is_empty() {
                                channel_tags(channel)
                            } else {
                                generated.tags
                            },
                            category_id: channel.policy.category_id.clone(),
                            source: MetadataSource::Ai,
                            provider: Some(provider.name().to_string()),
                        });
                    }
                    AnalysisOutcome::Success(_) => {
                        warn!("{} returned an empty title, trying next provider", provider.name());
                    }
                    AnalysisOutcome::QuotaExceeded(reason) => {
                        warn!(
                            "{} quota exceeded, trying next provider: {}",
                            provider.name(),
                            reason
                        );
                    }
                    AnalysisOutcome::Failed(reason) => {
                        warn!("{} failed, trying next provider: {}", provider.name(), reason);
                    }
                }
            }
            warn!("{}: no AI provider succeeded, using templates", channel.id);
        }
        clamp(template_metadata(channel, item))
    }
}

fn build_prompt(channel: &Channel, item: &Item) -> String {
    let mut prompt = format!(
        "Watch this short video and write YouTube Shorts metadata for the channel \"{}\". \
         Reply with a JSON object with keys \"title\" (under {} characters, catchy, \
         ending with #Shorts), \"description\" (2-3 sentences followed by hashtags) \
         and \"tags\" (up to {} short keywords).",
        channel.name, MAX_TITLE_CHARS, MAX_TAGS
    );
    if !channel.policy.categories.is_empty() {
        prompt.push_str(&format!(
            " The channel covers: {}.",
            channel.policy.categories.join(", ")
        ));
    }
    prompt.push_str(&format!(" The source file is named \"{}\".", item.name));
    prompt
}

fn channel_tags(channel: &Channel) -> Vec<String> {
    if channel.policy.default_tags.is_empty() {
        DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
    } else {
        channel.policy.default_tags.clone()
    }
}

fn leading_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s*").expect("static regex"))
}

/// Turns a file name such as `0042_epic-fight.mp4` into `epic fight`.
pub fn clean_file_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let spaced = stem.replace(['_', '-'], " ");
    leading_digits().replace(&spaced, "").trim().to_string()
}

pub fn derive_title(file_name: &str, channel_name: &str) -> String {
    let cleaned = clean_file_name(file_name);
    let base = if cleaned.is_empty() {
        if channel_name.trim().is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            channel_name.trim().to_string()
        }
    } else {
        truncate_chars(&cleaned, DERIVED_TITLE_CHARS).trim_end().to_string()
    };
    format!("{}{}", base, TITLE_SUFFIX)
}

pub fn template_metadata(channel: &Channel, item: &Item) -> MetadataResult {
    let policy = &channel.policy;
    let uses_content = CONTENT_PLACEHOLDERS
        .iter()
        .any(|p| policy.title_template.contains(p) || policy.description_template.contains(p));

    let (title, description) = if uses_content {
        let title = derive_title(&item.name, &channel.name);
        let description = format!("{}\n\n{}", title, DESCRIPTION_HASHTAGS);
        (title, description)
    } else {
        (policy.title_template.clone(), policy.description_template.clone())
    };

    MetadataResult {
        title,
        description,
        tags: channel_tags(channel),
        category_id: policy.category_id.clone(),
        source: MetadataSource::Template,
        provider: None,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// YouTube rejects angle brackets in titles and descriptions.
fn clean_text(text: &str) -> String {
    text.replace(['<', '>'], "").trim().to_string()
}

/// Enforces title, description and tag limits.
pub fn clamp(mut metadata: MetadataResult) -> MetadataResult {
    metadata.title = truncate_chars(&clean_text(&metadata.title), MAX_TITLE_CHARS)
        .trim_end()
        .to_string();
    metadata.description =
        truncate_chars(&clean_text(&metadata.description), MAX_DESCRIPTION_CHARS).to_string();

    let mut seen = HashSet::new();
    let mut total = 0;
    let mut tags = Vec::new();
    for tag in metadata.tags.iter().map(|t| clean_text(t.trim_start_matches('#'))) {
        if tag.is_empty() || !seen.insert(tag.to_lowercase()) {
            continue;
        }
        let len = tag.chars().count();
        if tags.len() >= MAX_TAGS || total + len > MAX_TAGS_TOTAL_CHARS {
            break;
        }
        total += len;
        tags.push(tag);
    }
    metadata.tags = tags;
    metadata
}
