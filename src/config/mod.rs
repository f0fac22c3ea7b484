//! Configuration management for pinglun crawler
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files, and locating the credential token sent to the
//! signed comment and search endpoints.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::CrawlMode;

/// Default fallback credential files, tried in order
pub const DEFAULT_CREDENTIAL_PATHS: &[&str] = &["bili_cookie.txt", "py-crawler/bili_cookie.txt"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Credential token lookup
    pub credential: CredentialConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Upstream base URLs
    pub endpoints: EndpointConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Fixed delay applied before every outbound request
    pub request_delay_ms: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Primary comment ordering
    pub mode: CrawlMode,

    /// Fetch reply sub-pages for top-level comments
    pub with_replies: bool,

    /// Reply sub-page cap per root comment (0 = default of 10)
    pub max_reply_pages: u32,

    /// Primary comment page cap (0 = until the cursor ends)
    pub max_comment_pages: u32,

    /// Every n-th processed comment triggers an escalated pause
    pub escalation_every: u64,

    /// Escalated pause as a multiple of the base delay
    pub escalation_factor: u32,

    /// News listing pages to crawl
    pub news_pages: u32,

    /// Article comment pages to crawl per article
    pub article_comment_pages: u32,

    /// First search results page
    pub search_page: u32,

    /// Search results per page
    pub search_page_size: u32,
}

/// Credential token lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Explicit token file; when set, no fallback lookup happens
    pub path: Option<PathBuf>,
    /// Token files tried in order when `path` is unset
    pub fallbacks: Vec<PathBuf>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            path: None,
            fallbacks: DEFAULT_CREDENTIAL_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Upstream base URLs, overridable for mock servers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub bilibili_api: String,
    pub bilibili_www: String,
    pub gamersky_app_api: String,
    pub gamersky_wap: String,
    pub gamersky_comment_api: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 500,
            request_timeout_secs: 30,
            mode: CrawlMode::Latest,
            with_replies: true,
            max_reply_pages: 10,
            max_comment_pages: 0,
            escalation_every: 1000,
            escalation_factor: 10,
            news_pages: 1,
            article_comment_pages: 10,
            search_page: 1,
            search_page_size: 20,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/pinglun.db"),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bilibili_api: String::from("https://api.bilibili.com"),
            bilibili_www: String::from("https://www.bilibili.com"),
            gamersky_app_api: String::from("https://appapi2.gamersky.com"),
            gamersky_wap: String::from("https://wap.gamersky.com"),
            gamersky_comment_api: String::from("https://cm.gamersky.com"),
        }
    }
}

impl EndpointConfig {
    /// Point every upstream at one base URL (mock servers)
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            bilibili_api: base.clone(),
            bilibili_www: base.clone(),
            gamersky_app_api: base.clone(),
            gamersky_wap: base.clone(),
            gamersky_comment_api: base,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let crawler = &mut config.crawler;

        if let Some(delay) = env_parse("PINGLUN_REQUEST_DELAY_MS") {
            crawler.request_delay_ms = delay;
        }
        if let Some(timeout) = env_parse("PINGLUN_REQUEST_TIMEOUT") {
            crawler.request_timeout_secs = timeout;
        }
        if let Some(mode) = env_parse("PINGLUN_MODE") {
            crawler.mode = mode;
        }
        if let Some(with_replies) = env_parse("PINGLUN_WITH_REPLIES") {
            crawler.with_replies = with_replies;
        }
        if let Some(pages) = env_parse("PINGLUN_MAX_REPLY_PAGES") {
            crawler.max_reply_pages = pages;
        }
        if let Some(pages) = env_parse("PINGLUN_MAX_COMMENT_PAGES") {
            crawler.max_comment_pages = pages;
        }

        if let Ok(path) = std::env::var("PINGLUN_COOKIE_PATH") {
            config.credential.path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("PINGLUN_SQLITE_PATH") {
            config.database.sqlite_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("PINGLUN_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("PINGLUN_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawler.escalation_every == 0 {
            anyhow::bail!("escalation_every must be greater than 0");
        }

        if self.crawler.search_page == 0 || self.crawler.search_page_size == 0 {
            anyhow::bail!("search_page and search_page_size must be greater than 0");
        }

        if self.database.sqlite_path.as_os_str().is_empty() {
            anyhow::bail!("sqlite_path must not be empty");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    /// Read the credential token
    ///
    /// An explicit path must exist. Without one, the fallback locations are
    /// tried in order and `None` is returned when none of them exists.
    pub fn load_credential(&self) -> Result<Option<String>> {
        if let Some(path) = &self.credential.path {
            let token = read_token(path)?;
            return Ok(Some(token));
        }

        for path in &self.credential.fallbacks {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "Using credential file");
                return read_token(path).map(Some);
            }
        }

        Ok(None)
    }
}

fn read_token(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credential file: {}", path.display()))?;
    Ok(content.trim().to_string())
}
