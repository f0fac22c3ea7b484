//! Crawl entry points wiring adapters, sinks and the store together

use anyhow::{Context, Result};
use serde::Serialize;

use super::bilibili::{PrimaryCommentAdapter, ReplyAdapter, SearchAdapter, VideoResolver};
use super::gamersky::{ArticleCommentAdapter, NewsAdapter, NewsApiAdapter, NewsHtmlAdapter};
use super::sink::{StoreSink, ThreadSink};
use super::{
    CommentTreeAssembler, CrawlOrchestrator, CrawlReport, HttpFetcher, RateLimitPolicy, RateLimiter,
    SourceAdapter,
};
use crate::config::{Config, CrawlerConfig};
use crate::models::{CommentSource, CrawlMode, CrawlRunState, Cursor};
use crate::storage::{RecordRepository, SharedRecordRepository};
use crate::utils::error::FetchError;

/// Per-run options for a video comment crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRunOptions {
    pub mode: CrawlMode,
    pub with_replies: bool,
    pub max_reply_pages: u32,
    /// Primary page cap (0 = until the cursor ends)
    pub max_pages: u32,
    /// Offset to continue from instead of the first page
    pub resume_offset: Option<String>,
}

impl CommentRunOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            mode: config.mode,
            with_replies: config.with_replies,
            max_reply_pages: config.max_reply_pages,
            max_pages: config.max_comment_pages,
            resume_offset: None,
        }
    }
}

/// News run followed by one comment run per collected article
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub news: CrawlReport,
    pub articles: Vec<CrawlReport>,
}

impl ChainReport {
    pub fn comments_stored(&self) -> u64 {
        self.articles.iter().map(|r| r.stored).sum()
    }
}

/// Crawl facade over one store
pub struct Crawler {
    config: Config,
    fetcher: HttpFetcher,
    orchestrator: CrawlOrchestrator,
    repo: SharedRecordRepository,
    cookie: Option<String>,
}

impl Crawler {
    /// Create a crawler; the credential token is looked up once here
    pub fn new(config: Config, repo: SharedRecordRepository) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let fetcher = HttpFetcher::with_timeout(config.request_timeout())
            .context("Failed to create HTTP client")?;
        let limiter = RateLimiter::new(RateLimitPolicy::from_config(&config.crawler));
        let cookie = config.load_credential()?;
        if cookie.is_none() {
            tracing::warn!("No credential token found; video comment and search runs will fail");
        }

        Ok(Self {
            config,
            fetcher,
            orchestrator: CrawlOrchestrator::new(limiter),
            repo,
            cookie,
        })
    }

    /// Replace the credential token
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    /// Replace the rate limiter
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.orchestrator = CrawlOrchestrator::new(limiter);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &dyn RecordRepository {
        self.repo.as_ref()
    }

    fn require_cookie(&self, source: &'static str) -> Result<String> {
        self.cookie
            .clone()
            .ok_or_else(|| FetchError::MissingCredential(source).into())
    }

    fn state(&self, target: impl Into<String>, cursor: Cursor, page_cap: u32) -> CrawlRunState {
        CrawlRunState::new(target, cursor).with_page_cap(page_cap)
    }

    /// Crawl the comment threads of one video
    ///
    /// A resumed run continues serial numbering after the highest serial
    /// already stored for the video.
    pub async fn video_comments(
        &self,
        bvid: &str,
        options: &CommentRunOptions,
    ) -> Result<CrawlReport> {
        let cookie = self.require_cookie("video comments")?;
        let endpoints = &self.config.endpoints;

        let resolver = VideoResolver::new(
            self.fetcher.clone(),
            &endpoints.bilibili_www,
            Some(cookie.clone()),
        );
        let info = resolver
            .resolve(bvid)
            .await
            .with_context(|| format!("Failed to resolve video {bvid}"))?;

        let adapter = PrimaryCommentAdapter::new(
            self.fetcher.clone(),
            &endpoints.bilibili_api,
            Some(cookie.clone()),
            options.mode,
        );
        let replies = options.with_replies.then(|| {
            ReplyAdapter::new(
                self.fetcher.clone(),
                &endpoints.bilibili_api,
                Some(cookie),
                info.oid.clone(),
                options.max_reply_pages,
            )
        });

        let assembler =
            CommentTreeAssembler::new(CommentSource::Video, bvid).with_title(info.title);
        let mut sink = ThreadSink::new(self.repo.as_ref(), assembler, &self.orchestrator);
        if let Some(replies) = &replies {
            sink = sink.with_replies(replies);
        }

        let cursor = options
            .resume_offset
            .clone()
            .map(Cursor::Offset)
            .unwrap_or_else(|| adapter.initial_cursor());
        let mut state = self.state(info.oid, cursor, options.max_pages);
        if options.resume_offset.is_some() {
            state.serial = self
                .repo
                .comments_for(CommentSource::Video, bvid)?
                .iter()
                .map(|c| c.serial)
                .max()
                .unwrap_or(0);
        }

        Ok(self.orchestrator.run(&adapter, state, &mut sink).await)
    }

    /// Crawl search results for a keyword starting at `page`
    pub async fn search(&self, keyword: &str, page: u32, pages: u32) -> Result<CrawlReport> {
        let cookie = self.require_cookie("video search")?;
        let adapter = SearchAdapter::new(
            self.fetcher.clone(),
            &self.config.endpoints.bilibili_api,
            Some(cookie),
            self.config.crawler.search_page_size,
        );

        let mut sink = StoreSink::new(self.repo.as_ref());
        let state = self.state(keyword, Cursor::Page(page.max(1)), pages.max(1));
        Ok(self.orchestrator.run(&adapter, state, &mut sink).await)
    }

    /// Crawl the first `pages` news listing pages
    pub async fn news(&self, pages: u32) -> CrawlReport {
        let endpoints = &self.config.endpoints;
        let adapter = NewsAdapter::new(
            NewsHtmlAdapter::new(self.fetcher.clone(), &endpoints.gamersky_wap),
            NewsApiAdapter::new(self.fetcher.clone(), &endpoints.gamersky_app_api),
        );

        let mut sink = StoreSink::new(self.repo.as_ref());
        let state = self.state("news", adapter.initial_cursor(), pages.max(1));
        self.orchestrator.run(&adapter, state, &mut sink).await
    }

    /// Crawl up to `pages` comment pages of one article (at least one)
    pub async fn article_comments(&self, article_id: &str, pages: u32) -> CrawlReport {
        let adapter = ArticleCommentAdapter::new(
            self.fetcher.clone(),
            &self.config.endpoints.gamersky_comment_api,
        );
        let assembler = CommentTreeAssembler::new(CommentSource::Article, article_id);
        let mut sink = ThreadSink::new(self.repo.as_ref(), assembler, &self.orchestrator);

        let state = self.state(article_id, adapter.initial_cursor(), pages.max(1));
        self.orchestrator.run(&adapter, state, &mut sink).await
    }

    /// Crawl news pages, then the comments of every collected article
    pub async fn news_with_comments(&self, news_pages: u32, comment_pages: u32) -> ChainReport {
        let news = self.news(news_pages).await;
        tracing::info!(
            articles = news.collected_ids.len(),
            "Crawling comments of collected articles"
        );

        let mut articles = Vec::with_capacity(news.collected_ids.len());
        for article_id in &news.collected_ids {
            articles.push(self.article_comments(article_id, comment_pages).await);
        }

        ChainReport { news, articles }
    }
}
