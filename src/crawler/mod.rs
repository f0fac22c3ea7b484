//! Paginated ingestion from the upstream sources
//!
//! Every source implements [`SourceAdapter`]: fetch one page for a target at
//! a cursor. The [`orchestrator`] drives any adapter through the same loop and
//! hands each page to a [`sink`] for assembly and persistence. [`Crawler`]
//! wires the per-source runs together.

pub mod assembler;
pub mod bilibili;
pub mod fetcher;
pub mod gamersky;
pub mod headers;
pub mod orchestrator;
pub mod rate_limit;
pub mod session;
pub mod signer;
pub mod sink;

use async_trait::async_trait;

use crate::models::{CommentDraft, CommentThread, Cursor, NewsItem, VideoRecord};
use crate::utils::error::CrawlerError;

pub use assembler::CommentTreeAssembler;
pub use fetcher::HttpFetcher;
pub use orchestrator::{CrawlOrchestrator, CrawlReport, StopReason};
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use session::{ChainReport, CommentRunOptions, Crawler};
pub use signer::SignedRequestBuilder;
pub use sink::{CollectSink, StoreSink, ThreadSink};

/// Result of one page fetch
///
/// A page can carry both items and an error: items extracted before a
/// failure are still handed to the sink.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page; `None` when the stream cannot continue
    pub next: Option<Cursor>,
    pub has_more: bool,
    pub error: Option<CrawlerError>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<Cursor>, has_more: bool) -> Self {
        Self {
            items,
            next,
            has_more,
            error: None,
        }
    }

    /// A page that produced nothing
    ///
    /// Page-indexed sources pass the successor cursor so the loop can skip
    /// past the failed page.
    pub fn failed(error: impl Into<CrawlerError>, next: Option<Cursor>) -> Self {
        let has_more = next.is_some();
        Self {
            items: Vec::new(),
            next,
            has_more,
            error: Some(error.into()),
        }
    }

    pub fn with_error(mut self, error: impl Into<CrawlerError>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// One upstream source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Item: Identified + Send;

    /// Short source name for logs and reports
    fn name(&self) -> &'static str;

    /// Cursor that starts the stream
    fn initial_cursor(&self) -> Cursor {
        Cursor::first_page()
    }

    /// Fetch the page of `target` at `cursor`
    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<Self::Item>;
}

/// Records exposing their natural id (collected for chaining)
pub trait Identified {
    fn natural_id(&self) -> String;
}

impl Identified for CommentDraft {
    fn natural_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for CommentThread {
    fn natural_id(&self) -> String {
        self.root.id.to_string()
    }
}

impl Identified for NewsItem {
    fn natural_id(&self) -> String {
        self.sid.clone()
    }
}

impl Identified for VideoRecord {
    fn natural_id(&self) -> String {
        self.bvid.clone()
    }
}
