//! AI metadata providers.

use crate::config::GeminiConfig;
use crate::metadata::MetadataProvider;
use reqwest::Client;

pub mod gemini;

pub use gemini::GeminiProvider;

/// Providers in priority order. Empty when no API key is configured.
pub fn from_config(client: &Client, gemini: &GeminiConfig) -> Vec<Box<dyn MetadataProvider>> {
    if gemini.api_key.trim().is_empty() {
        return Vec::new();
    }
    gemini
        .models
        .iter()
        .map(|model| {
            Box::new(GeminiProvider::new(
                client.clone(),
                &gemini.api_base,
                &gemini.api_key,
                model,
            )) as Box<dyn MetadataProvider>
        })
        .collect()
}
