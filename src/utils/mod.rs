//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Timestamp format used for every stored time column
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Remove markup tags and decode HTML entities
///
/// Search results wrap matched keywords in `<em class="keyword">`.
pub fn strip_tags(text: &str) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();

    let re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid regex pattern"));

    let no_tags = re.replace_all(text, "");
    html_escape::decode_html_entities(&no_tags).into_owned()
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// First run of ASCII digits in `text`, e.g. `共15条回复` -> 15
pub fn first_integer(text: &str) -> Option<i64> {
    static DIGITS_RE: OnceLock<Regex> = OnceLock::new();

    let re = DIGITS_RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex pattern"));

    re.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Convert unix seconds, falling back to the epoch for out-of-range values
pub fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Convert unix milliseconds, falling back to the epoch for out-of-range values
pub fn from_unix_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Format a timestamp for storage
pub fn format_db_time(time: &DateTime<Utc>) -> String {
    time.format(DB_TIME_FORMAT).to_string()
}

/// Drop repeated identifiers, keeping first occurrence order
pub fn dedup_preserving_order(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Accept a number, a numeric string, or anything else as 0
pub fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        serde_json::Value::Bool(b) => i64::from(b),
        _ => 0,
    })
}

/// Accept a string or a number rendered as a string
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
