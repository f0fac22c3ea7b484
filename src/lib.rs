//! pinglun - paginated comment, search and news ingestion
//!
//! Crawls video comment threads, video search results, news listings and
//! article comment threads from their upstream APIs and pages, normalizes
//! them into uniform records and stores them idempotently in SQLite.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and credential lookup
//! - [`crawler`] - Source adapters, pagination loop and rate limiting
//! - [`models`] - Core data structures and types
//! - [`storage`] - Idempotent SQLite persistence
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use pinglun::config::Config;
//! use pinglun::crawler::{CommentRunOptions, Crawler};
//! use pinglun::storage::create_sqlite_repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo = create_sqlite_repository(&config.database.sqlite_path)?;
//!     let options = CommentRunOptions::from_config(&config.crawler);
//!     let crawler = Crawler::new(config, repo)?;
//!     let report = crawler.video_comments("BV1xx411c7mD", &options).await?;
//!     println!("stored {} comments", report.stored);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CrawlReport, Crawler, SourceAdapter};
    pub use crate::error::{ErrorCategory, PinglunErrorTrait};
    pub use crate::models::{Comment, CommentSource, CrawlMode, Cursor, NewsItem, VideoRecord};
    pub use crate::storage::{RecordRepository, SqliteRecordRepository};
}

// Direct re-exports for convenience
pub use models::{Comment, CommentSource, NewsItem, VideoRecord};
