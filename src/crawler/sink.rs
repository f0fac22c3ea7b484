//! Page sinks: what happens to a page after it is fetched

use async_trait::async_trait;
use chrono::Utc;

use super::assembler::CommentTreeAssembler;
use super::bilibili::ReplyAdapter;
use super::orchestrator::{CrawlOrchestrator, PageSink};
use crate::models::{CommentDraft, CommentThread, CrawlRunState, Cursor};
use crate::storage::{RecordRepository, Storable};

fn persist<T: Storable>(repo: &dyn RecordRepository, record: &T, state: &mut CrawlRunState) {
    match record.store(repo) {
        Ok(true) => state.stored += 1,
        Ok(false) => {}
        Err(e) => tracing::warn!(target_id = %state.target, error = %e, "Failed to persist record"),
    }
}

/// Keeps fetched items in memory
#[derive(Debug)]
pub struct CollectSink<T> {
    pub items: Vec<T>,
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[async_trait]
impl<T: Send> PageSink<T> for CollectSink<T> {
    async fn accept(&mut self, _state: &mut CrawlRunState, items: Vec<T>) {
        self.items.extend(items);
    }
}

/// Writes flat records (news items, search results) as they come
pub struct StoreSink<'a> {
    repo: &'a dyn RecordRepository,
}

impl<'a> StoreSink<'a> {
    pub fn new(repo: &'a dyn RecordRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<'a, T> PageSink<T> for StoreSink<'a>
where
    T: Storable + Send + 'static,
{
    async fn accept(&mut self, state: &mut CrawlRunState, items: Vec<T>) {
        for item in &items {
            persist(self.repo, item, state);
        }
    }
}

/// Assembles comment threads and writes them root first
///
/// With a reply adapter attached, every root reporting replies is expanded
/// through the reply sub-resource before assembly.
pub struct ThreadSink<'a> {
    repo: &'a dyn RecordRepository,
    assembler: CommentTreeAssembler,
    orchestrator: &'a CrawlOrchestrator,
    replies: Option<&'a ReplyAdapter>,
}

impl<'a> ThreadSink<'a> {
    pub fn new(
        repo: &'a dyn RecordRepository,
        assembler: CommentTreeAssembler,
        orchestrator: &'a CrawlOrchestrator,
    ) -> Self {
        Self {
            repo,
            assembler,
            orchestrator,
            replies: None,
        }
    }

    pub fn with_replies(mut self, adapter: &'a ReplyAdapter) -> Self {
        self.replies = Some(adapter);
        self
    }

    /// Fetch the reply sub-pages of one root; failed sub-pages are counted in `state`
    async fn expand(
        &self,
        adapter: &ReplyAdapter,
        state: &mut CrawlRunState,
        root_id: i64,
        reply_count: i64,
    ) -> Vec<CommentDraft> {
        let pages = adapter.page_budget(reply_count);
        let run =
            CrawlRunState::new(root_id.to_string(), Cursor::first_page()).with_page_cap(pages);
        let mut collected = CollectSink::default();

        let report = self.orchestrator.run(adapter, run, &mut collected).await;
        state.errors += report.errors;
        tracing::debug!(
            root_id,
            reply_count,
            pages = report.pages,
            errors = report.errors,
            fetched = collected.items.len(),
            "Expanded replies"
        );

        collected.items
    }
}

#[async_trait]
impl<'a> PageSink<CommentThread> for ThreadSink<'a> {
    async fn accept(&mut self, state: &mut CrawlRunState, items: Vec<CommentThread>) {
        for mut thread in items {
            if let Some(adapter) = self.replies {
                if thread.root.reply_count > 0 && thread.root.id != 0 {
                    let replies = self
                        .expand(adapter, state, thread.root.id, thread.root.reply_count)
                        .await;
                    thread.replies.extend(replies);
                }
            }

            let assembly = self.assembler.assemble(state.serial, thread, Utc::now());
            state.serial = assembly.serial;
            state.skipped += assembly.skipped;

            for comment in &assembly.comments {
                persist(self.repo, comment, state);
                self.orchestrator.limiter().after_record(comment.serial).await;
            }
        }
    }
}
