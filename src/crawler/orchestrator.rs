//! Generic pagination loop
//!
//! `Start -> FetchPage -> Persist -> (continue | Stop)` for any
//! [`SourceAdapter`]. The loop stops when the source reports no further
//! cursor, when the cursor is terminal, when the page cap is reached, or
//! on a transport failure. Parse and provider errors only cost the page
//! they happened on while the source can name the page after it and the
//! run is capped; otherwise the run stops and reports the failed cursor.

use async_trait::async_trait;
use serde::Serialize;

use super::{Identified, Page, RateLimiter, SourceAdapter};
use crate::error::{ErrorCategory, PinglunErrorTrait};
use crate::models::{CrawlRunState, Cursor};
use crate::utils::dedup_preserving_order;

/// Consumer of fetched pages
#[async_trait]
pub trait PageSink<T: Send>: Send {
    /// Assemble and persist one page, updating counters in `state`
    async fn accept(&mut self, state: &mut CrawlRunState, items: Vec<T>);
}

/// Why a crawl loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source has nothing more
    Exhausted,
    /// The configured page cap was reached
    PageCap,
    /// A page failed before a usable response arrived
    TransportError,
    /// A page came back unusable and the stream could not move past it
    PageError,
}

/// Aggregate result of one crawl invocation
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub source: &'static str,
    pub target: String,
    pub pages: u32,
    /// Records parsed from responses
    pub fetched: u64,
    /// Records newly written to the store
    pub stored: u64,
    /// Records dropped as malformed
    pub skipped: u64,
    pub errors: u32,
    pub last_serial: u64,
    /// Where a follow-up run should resume, if the stream is not finished
    pub next_cursor: Option<Cursor>,
    /// Natural ids seen, first occurrence order
    pub collected_ids: Vec<String>,
    pub stop: StopReason,
}

/// Drives adapters through the fetch/persist loop
#[derive(Debug, Clone)]
pub struct CrawlOrchestrator {
    limiter: RateLimiter,
}

impl CrawlOrchestrator {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run one crawl invocation to completion
    pub async fn run<A, S>(&self, adapter: &A, state: CrawlRunState, sink: &mut S) -> CrawlReport
    where
        A: SourceAdapter,
        S: PageSink<A::Item>,
    {
        let mut state = state;
        let mut fetched = 0u64;
        let mut ids = Vec::new();
        let mut resume = None;

        tracing::info!(
            source = adapter.name(),
            target = %state.target,
            cursor = %state.cursor,
            page_cap = ?state.page_cap,
            "Crawl started"
        );

        let stop = loop {
            if state.cap_reached() {
                tracing::debug!(pages = state.pages, "Reached page cap");
                break StopReason::PageCap;
            }

            self.limiter.before_request().await;
            let Page {
                items,
                next,
                has_more,
                error,
            } = adapter.fetch_page(&state.target, &state.cursor).await;
            state.pages += 1;

            let count = items.len();
            fetched += count as u64;
            ids.extend(items.iter().map(Identified::natural_id));

            let stored_before = state.stored;
            if !items.is_empty() {
                sink.accept(&mut state, items).await;
            }

            tracing::debug!(
                source = adapter.name(),
                page = state.pages,
                cursor = %state.cursor,
                fetched = count,
                stored = state.stored - stored_before,
                has_more,
                "Page processed"
            );

            if let Some(err) = error {
                state.errors += 1;
                let category = err.category();
                tracing::warn!(
                    source = adapter.name(),
                    page = state.pages,
                    category = %category,
                    error = %err,
                    "Page failed"
                );
                if matches!(category, ErrorCategory::Network | ErrorCategory::Config) {
                    resume = Some(state.cursor.clone());
                    break StopReason::TransportError;
                }
                // An uncapped run would otherwise step past empty failures forever
                if next.is_none() || (count == 0 && state.page_cap.is_none()) {
                    resume = Some(state.cursor.clone());
                    break StopReason::PageError;
                }
            }

            match next {
                Some(next) if has_more && !next.is_terminal() => {
                    state.cursor = next;
                    resume = Some(state.cursor.clone());
                }
                _ => {
                    resume = None;
                    break StopReason::Exhausted;
                }
            }
        };

        let report = CrawlReport {
            source: adapter.name(),
            target: state.target,
            pages: state.pages,
            fetched,
            stored: state.stored,
            skipped: state.skipped,
            errors: state.errors,
            last_serial: state.serial,
            next_cursor: resume,
            collected_ids: dedup_preserving_order(ids),
            stop,
        };

        tracing::info!(
            source = report.source,
            target = %report.target,
            pages = report.pages,
            fetched = report.fetched,
            stored = report.stored,
            skipped = report.skipped,
            errors = report.errors,
            stop = ?report.stop,
            "Crawl finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::rate_limit::{RateLimitPolicy, RecordingSleeper};
    use crate::crawler::sink::CollectSink;
    use crate::models::NewsItem;
    use crate::utils::error::{FetchError, ParseError};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn item(sid: &str) -> NewsItem {
        NewsItem {
            sid: sid.to_string(),
            title: sid.to_string(),
            time: String::new(),
            comment_count: 0,
            url: String::new(),
            image_url: String::new(),
            topline_time: String::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Adapter replaying scripted pages, then reporting an endless stream
    struct Scripted {
        pages: Mutex<Vec<Page<NewsItem>>>,
        calls: Mutex<Vec<Cursor>>,
    }

    impl Scripted {
        fn new(mut pages: Vec<Page<NewsItem>>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Cursor> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceAdapter for Scripted {
        type Item = NewsItem;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, _target: &str, cursor: &Cursor) -> Page<NewsItem> {
            self.calls.lock().unwrap().push(cursor.clone());
            match self.pages.lock().unwrap().pop() {
                Some(page) => page,
                None => Page::new(vec![item("again")], cursor.advance(), true),
            }
        }
    }

    fn orchestrator() -> CrawlOrchestrator {
        CrawlOrchestrator::new(RateLimiter::unlimited())
    }

    #[tokio::test]
    async fn test_page_cap_bounds_endless_stream() {
        let adapter = Scripted::new(Vec::new());
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page()).with_page_cap(4);

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(report.pages, 4);
        assert_eq!(report.stop, StopReason::PageCap);
        assert_eq!(report.next_cursor, Some(Cursor::Page(5)));
        assert_eq!(adapter.calls().len(), 4);
        assert_eq!(report.collected_ids, vec!["again"]);
    }

    #[tokio::test]
    async fn test_stops_when_source_has_no_more() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1"), item("2")], Some(Cursor::Page(2)), true),
            Page::new(vec![item("3")], Some(Cursor::Page(3)), false),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page());

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(report.pages, 2);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.next_cursor, None);
        assert_eq!(sink.items.len(), 3);
    }

    #[tokio::test]
    async fn test_terminal_offset_ends_loop() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1")], Some(Cursor::Offset("abc".into())), true),
            Page::new(vec![item("2")], Some(Cursor::Offset("0".into())), true),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_offset());

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(
            adapter.calls(),
            vec![Cursor::first_offset(), Cursor::Offset("abc".into())]
        );
        assert_eq!(report.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_parse_error_skips_page_and_keeps_partial_records() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1")], Some(Cursor::Page(2)), true)
                .with_error(ParseError::Html("truncated".into())),
            Page::failed(ParseError::MissingField("result"), Some(Cursor::Page(3))),
            Page::new(vec![item("3")], Some(Cursor::Page(4)), false),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page()).with_page_cap(10);

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(report.pages, 3);
        assert_eq!(report.errors, 2);
        assert_eq!(report.collected_ids, vec!["1", "3"]);
        assert_eq!(report.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_uncapped_run_stops_on_empty_failed_page() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1")], Some(Cursor::Page(2)), true),
            Page::failed(ParseError::MissingField("result"), Some(Cursor::Page(3))),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page());

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(adapter.calls().len(), 2);
        assert_eq!(report.stop, StopReason::PageError);
        assert_eq!(report.next_cursor, Some(Cursor::Page(2)));
    }

    #[tokio::test]
    async fn test_failed_offset_page_keeps_resume_cursor() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1")], Some(Cursor::Offset("PAGE2".into())), true),
            Page::failed(
                FetchError::Provider {
                    code: -352,
                    message: "risk control".into(),
                },
                None,
            ),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_offset()).with_page_cap(10);

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(report.stop, StopReason::PageError);
        assert_eq!(report.next_cursor, Some(Cursor::Offset("PAGE2".into())));
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn test_transport_error_ends_loop_with_resume_cursor() {
        let adapter = Scripted::new(vec![
            Page::new(vec![item("1")], Some(Cursor::Page(2)), true),
            Page::failed(FetchError::Timeout, Some(Cursor::Page(3))),
        ]);
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page());

        let report = orchestrator().run(&adapter, state, &mut sink).await;

        assert_eq!(report.stop, StopReason::TransportError);
        assert_eq!(report.next_cursor, Some(Cursor::Page(2)));
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn test_delay_before_every_request() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let limiter = RateLimiter::with_sleeper(
            RateLimitPolicy::with_delay(Duration::from_millis(250)),
            sleeper.clone(),
        );
        let adapter = Scripted::new(Vec::new());
        let mut sink = CollectSink::default();
        let state = CrawlRunState::new("t", Cursor::first_page()).with_page_cap(3);

        CrawlOrchestrator::new(limiter)
            .run(&adapter, state, &mut sink)
            .await;

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(250); 3]);
    }
}
