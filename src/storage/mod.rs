//! Idempotent persistence of crawled records
//!
//! Records are written one at a time with insert-if-absent semantics. A
//! failure on one record is reported to the caller, who logs it and moves on.

pub mod repository;

use anyhow::Result;

use crate::models::{Comment, NewsItem, VideoRecord};

pub use repository::{
    create_sqlite_repository, MockRecordRepository, RecordRepository, SharedRecordRepository,
    SqliteRecordRepository, TableCounts,
};

/// A record that knows which table it belongs in
pub trait Storable {
    /// Insert if absent; `Ok(true)` when a new row was written
    fn store(&self, repo: &dyn RecordRepository) -> Result<bool>;
}

impl Storable for Comment {
    fn store(&self, repo: &dyn RecordRepository) -> Result<bool> {
        repo.insert_comment(self)
    }
}

impl Storable for NewsItem {
    fn store(&self, repo: &dyn RecordRepository) -> Result<bool> {
        repo.insert_news(self)
    }
}

impl Storable for VideoRecord {
    fn store(&self, repo: &dyn RecordRepository) -> Result<bool> {
        repo.insert_video(self)
    }
}
