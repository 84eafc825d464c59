use std::time::Duration;

pub mod auth;
pub mod channels;
pub mod cli;
pub mod config;
pub mod context;
pub mod drive;
pub mod error;
pub mod identifiers;
pub mod metadata;
pub mod models;
pub mod providers;
pub mod rotation;
pub mod selector;
pub mod service;
pub mod store;
pub mod youtube;


pub use error::{PublisherError, Result};

/// Parses a duration such as `5s`, `250ms`, `2m`, `1h` or `1d`.
/// A bare number is read as seconds.
pub fn parse_duration(duration_str: &str) -> std::result::Result<Duration, String> {
    let duration_str = duration_str.trim().to_lowercase();
    let invalid = |reason: String| format!("Invalid duration '{}': {}", duration_str, reason);
    let number = |digits: &str| -> std::result::Result<u64, String> {
        digits.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))
    };
    let scaled = |digits: &str, unit: u64| -> std::result::Result<Duration, String> {
        number(digits)?
            .checked_mul(unit)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid("too large".to_string()))
    };

    if let Some(ms) = duration_str.strip_suffix("ms") {
        Ok(Duration::from_millis(number(ms)?))
    } else if let Some(secs) = duration_str.strip_suffix('s') {
        scaled(secs, 1)
    } else if let Some(minutes) = duration_str.strip_suffix('m') {
        scaled(minutes, 60)
    } else if let Some(hours) = duration_str.strip_suffix('h') {
        scaled(hours, 3600)
    } else if let Some(days) = duration_str.strip_suffix('d') {
        scaled(days, 86_400)
    } else {
        scaled(duration_str.as_str(), 1)
    }
}

pub fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            path.replacen("~", &home, 1)
        } else {
            path.to_string()
        }
    } else {
        path.to_string()
    }
}
