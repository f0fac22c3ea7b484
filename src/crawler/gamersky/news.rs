//! News listing adapters
//!
//! The first listing page is only available as HTML; later pages come from a
//! JSON index endpoint whose page 1 is shaped differently. [`NewsAdapter`]
//! hides the split behind one page-indexed stream.

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::build_gamersky_headers;
use crate::crawler::{Page, SourceAdapter};
use crate::models::{Cursor, NewsItem};
use crate::utils::error::{FetchError, ParseError};
use crate::utils::normalize_whitespace;

/// Items per index API page
pub const NEWS_API_PAGE_SIZE: u32 = 15;

macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    static ref LIST_ITEM: Selector = parse_selector!("li[data-id]");
    static ref SANTU_TITLE: Selector = parse_selector!(".sanTu h5");
    static ref SANTU_LINK: Selector = parse_selector!(".sanTu a");
    static ref TITLE_AND_TIME_TITLE: Selector = parse_selector!(".titleAndTime h5");
    static ref ANY_LINK: Selector = parse_selector!("a");
    static ref TIME: Selector = parse_selector!("time");
    static ref COMMENT_NUM: Selector = parse_selector!(".commentNum");
    static ref IMAGE: Selector = parse_selector!("img");
    static ref LOAD_MORE: Selector = parse_selector!("a.clickLoadMoreBtn");

    static ref IMG_SRC: Regex =
        Regex::new(r#"src=['"]([^'"]*?)['"]"#).expect("Invalid regex pattern");
}

// ============================================================================
// HTML first page
// ============================================================================

/// Listing item layouts seen on the first page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    SanTu,
    TitleAndTime,
}

fn text_of(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| normalize_whitespace(&e.text().collect::<String>()))
}

fn attr_of(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> String {
    element
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(attr))
        .unwrap_or_default()
        .to_string()
}

/// Parse the HTML listing; returns items and whether a load-more button exists
pub fn parse_news_html(html: &str) -> (Vec<NewsItem>, bool) {
    let document = Html::parse_document(html);
    let recorded_at = Utc::now();
    let mut items = Vec::new();

    for element in document.select(&LIST_ITEM) {
        let value = element.value();
        let sid = value.attr("data-id").unwrap_or_default().trim().to_string();
        if sid.is_empty() {
            continue;
        }

        let (layout, title) = match text_of(&element, &SANTU_TITLE) {
            Some(title) => (Layout::SanTu, title),
            None => (
                Layout::TitleAndTime,
                text_of(&element, &TITLE_AND_TIME_TITLE).unwrap_or_default(),
            ),
        };
        if title.is_empty() {
            continue;
        }

        let url = match layout {
            Layout::SanTu => attr_of(&element, &SANTU_LINK, "href"),
            Layout::TitleAndTime => attr_of(&element, &ANY_LINK, "href"),
        };

        let comment_count = text_of(&element, &COMMENT_NUM)
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);

        tracing::debug!(sid = %sid, layout = ?layout, title = %title, "Parsed news item");

        items.push(NewsItem {
            sid,
            title,
            time: text_of(&element, &TIME).unwrap_or_default(),
            comment_count,
            url,
            image_url: attr_of(&element, &IMAGE, "src"),
            topline_time: value.attr("data-toplinetime").unwrap_or_default().to_string(),
            recorded_at,
        });
    }

    let has_more = document.select(&LOAD_MORE).next().is_some();
    (items, has_more)
}

/// First-page HTML listing
#[derive(Debug, Clone)]
pub struct NewsHtmlAdapter {
    fetcher: HttpFetcher,
    wap_base: String,
}

impl NewsHtmlAdapter {
    pub fn new(fetcher: HttpFetcher, wap_base: &str) -> Self {
        Self {
            fetcher,
            wap_base: wap_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for NewsHtmlAdapter {
    type Item = NewsItem;

    fn name(&self) -> &'static str {
        "news-html"
    }

    async fn fetch_page(&self, _target: &str, cursor: &Cursor) -> Page<NewsItem> {
        let url = format!("{}/", self.wap_base);
        match self.fetcher.get_text(&url, build_gamersky_headers(None)).await {
            Ok(html) => {
                let (items, has_more) = parse_news_html(&html);
                Page::new(items, cursor.advance(), has_more)
            }
            Err(e) => Page::failed(e, None),
        }
    }
}

// ============================================================================
// JSON index API
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRequestData {
    pub page_size: u32,
    pub cache_time: u32,
    pub page_index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexRequest {
    pub request: IndexRequestData,
}

impl IndexRequest {
    pub fn page(page_index: u32) -> Self {
        Self {
            request: IndexRequestData {
                page_size: NEWS_API_PAGE_SIZE,
                cache_time: 1,
                page_index,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawIndexItem {
    #[serde(rename = "ArticleID")]
    pub article_id: i64,
    pub title: String,
    pub wap_top_line_time_today_label: String,
    pub wap_article_url: String,
    pub wap_san_tu_article_pic: String,
    #[serde(deserialize_with = "crate::utils::lenient_string")]
    pub top_line_time: String,
}

impl RawIndexItem {
    /// Image URL from the embedded `<img>` snippet
    pub fn image_url(&self) -> String {
        IMG_SRC
            .captures(&self.wap_san_tu_article_pic)
            .map(|c| c[1].to_string())
            .unwrap_or_default()
    }

    fn into_news(self) -> NewsItem {
        let image_url = self.image_url();
        NewsItem {
            sid: self.article_id.to_string(),
            title: self.title,
            time: self.wap_top_line_time_today_label,
            comment_count: 0,
            url: self.wap_article_url,
            image_url,
            topline_time: self.top_line_time,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexResponse {
    pub error_code: i64,
    pub error_message: String,
    pub result: Option<Vec<RawIndexItem>>,
}

impl IndexResponse {
    pub fn into_news(self) -> Result<Vec<NewsItem>, FetchError> {
        if self.error_code != 0 {
            return Err(FetchError::Provider {
                code: self.error_code,
                message: self.error_message,
            });
        }
        Ok(self
            .result
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.article_id != 0)
            .map(RawIndexItem::into_news)
            .collect())
    }
}

/// Index API for listing pages 2 and up
#[derive(Debug, Clone)]
pub struct NewsApiAdapter {
    fetcher: HttpFetcher,
    app_api_base: String,
}

impl NewsApiAdapter {
    pub fn new(fetcher: HttpFetcher, app_api_base: &str) -> Self {
        Self {
            fetcher,
            app_api_base: app_api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    type Item = NewsItem;

    fn name(&self) -> &'static str {
        "news-api"
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::Page(2)
    }

    async fn fetch_page(&self, _target: &str, cursor: &Cursor) -> Page<NewsItem> {
        let next = cursor.advance();
        let Some(page) = cursor.page_index() else {
            return Page::failed(
                ParseError::InvalidValue {
                    field: "cursor",
                    value: cursor.to_string(),
                },
                None,
            );
        };

        let url = format!("{}/v6/GetWapIndex", self.app_api_base);
        let response = match self
            .fetcher
            .post_json::<_, IndexResponse>(
                &url,
                build_gamersky_headers(None),
                &IndexRequest::page(page),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Page::failed(e, next),
        };

        match response.into_news() {
            Ok(items) => {
                tracing::debug!(page, count = items.len(), "Index page parsed");
                let has_more = !items.is_empty();
                Page::new(items, next, has_more)
            }
            Err(e) => Page::failed(e, next),
        }
    }
}

// ============================================================================
// Combined stream
// ============================================================================

/// Listing stream: page 1 from HTML, later pages from the index API
#[derive(Debug, Clone)]
pub struct NewsAdapter {
    html: NewsHtmlAdapter,
    api: NewsApiAdapter,
}

impl NewsAdapter {
    pub fn new(html: NewsHtmlAdapter, api: NewsApiAdapter) -> Self {
        Self { html, api }
    }
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    type Item = NewsItem;

    fn name(&self) -> &'static str {
        "news"
    }

    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<NewsItem> {
        match cursor.page_index() {
            Some(1) => self.html.fetch_page(target, cursor).await,
            _ => self.api.fetch_page(target, cursor).await,
        }
    }
}
