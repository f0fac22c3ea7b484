//! Reply sub-resource adapter
//!
//! Replies of one root comment are paged ten at a time. The number of pages
//! requested is derived from the root's reported reply count and clamped so
//! a single hot thread cannot fan out without bound.

use async_trait::async_trait;
use serde::Deserialize;

use super::RawReply;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::build_bilibili_headers;
use crate::crawler::{Page, SourceAdapter};
use crate::models::{CommentDraft, Cursor};
use crate::utils::error::{FetchError, ParseError};

/// Replies per sub-page
pub const REPLY_PAGE_SIZE: i64 = 10;

/// Sub-page cap used when none is configured
pub const DEFAULT_MAX_REPLY_PAGES: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplyPageData {
    pub replies: Option<Vec<RawReply>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplyPageResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<ReplyPageData>,
}

/// Adapter for replies under one video; targets are root comment ids
#[derive(Debug, Clone)]
pub struct ReplyAdapter {
    fetcher: HttpFetcher,
    api_base: String,
    cookie: Option<String>,
    oid: String,
    max_pages: u32,
}

impl ReplyAdapter {
    pub fn new(
        fetcher: HttpFetcher,
        api_base: &str,
        cookie: Option<String>,
        oid: impl Into<String>,
        max_pages: u32,
    ) -> Self {
        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_string(),
            cookie,
            oid: oid.into(),
            max_pages,
        }
    }

    /// Effective sub-page cap
    pub fn max_pages(&self) -> u32 {
        if self.max_pages == 0 {
            DEFAULT_MAX_REPLY_PAGES
        } else {
            self.max_pages
        }
    }

    /// Sub-pages to request for a root reporting `reply_count` replies
    pub fn page_budget(&self, reply_count: i64) -> u32 {
        if reply_count <= 0 {
            return 0;
        }
        let pages = (reply_count as u64).div_ceil(REPLY_PAGE_SIZE as u64);
        u32::try_from(pages)
            .unwrap_or(u32::MAX)
            .min(self.max_pages())
    }

    pub fn build_url(api_base: &str, oid: &str, root: &str, page: u32) -> String {
        format!(
            "{api_base}/x/v2/reply/reply?oid={oid}&type=1&root={root}&ps={REPLY_PAGE_SIZE}&pn={page}&web_location=333.788"
        )
    }
}

#[async_trait]
impl SourceAdapter for ReplyAdapter {
    type Item = CommentDraft;

    fn name(&self) -> &'static str {
        "video-replies"
    }

    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<CommentDraft> {
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

        let url = Self::build_url(&self.api_base, &self.oid, target, page);
        let headers = build_bilibili_headers(self.cookie.as_deref(), None);

        let response = match self
            .fetcher
            .get_json::<ReplyPageResponse>(&url, headers)
            .await
        {
            Ok(response) => response,
            Err(e) => return Page::failed(e, next),
        };

        if response.code != 0 {
            return Page::failed(
                FetchError::Provider {
                    code: response.code,
                    message: response.message,
                },
                next,
            );
        }

        let replies: Vec<CommentDraft> = response
            .data
            .and_then(|d| d.replies)
            .unwrap_or_default()
            .iter()
            .map(RawReply::to_draft)
            .collect();

        let has_more = !replies.is_empty();
        Page::new(replies, next, has_more)
    }
}
