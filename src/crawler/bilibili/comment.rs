//! Primary (top-level) comment adapter
//!
//! Pages through `/x/v2/reply/wbi/main` with a signed URL rebuilt for every
//! request. The continuation token is `data.cursor.pagination_reply.next_offset`.

use async_trait::async_trait;
use serde::Deserialize;

use super::RawReply;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::build_bilibili_headers;
use crate::crawler::signer::SignedRequestBuilder;
use crate::crawler::{Page, SourceAdapter};
use crate::models::{CommentThread, CrawlMode, Cursor};
use crate::utils::error::{FetchError, ParseError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaginationReply {
    pub next_offset: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainCursor {
    pub pagination_reply: PaginationReply,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainReplyData {
    pub replies: Option<Vec<RawReply>>,
    pub cursor: MainCursor,
}

/// Response of the signed comment endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainReplyResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<MainReplyData>,
}

impl MainReplyResponse {
    /// Convert a successful response into threads plus the continuation
    pub fn into_page(self) -> Page<CommentThread> {
        if self.code != 0 {
            return Page::failed(
                FetchError::Provider {
                    code: self.code,
                    message: self.message,
                },
                None,
            );
        }

        let Some(data) = self.data else {
            return Page::failed(ParseError::MissingField("data"), None);
        };

        let threads: Vec<CommentThread> = data
            .replies
            .unwrap_or_default()
            .iter()
            .map(|raw| CommentThread::new(raw.to_draft()))
            .collect();

        let next = Cursor::Offset(data.cursor.pagination_reply.next_offset);
        let has_more = !next.is_terminal();

        Page::new(threads, Some(next), has_more)
    }
}

/// Adapter for top-level video comments; targets are numeric object ids
#[derive(Debug, Clone)]
pub struct PrimaryCommentAdapter {
    fetcher: HttpFetcher,
    signer: SignedRequestBuilder,
    cookie: Option<String>,
    mode: CrawlMode,
}

impl PrimaryCommentAdapter {
    pub fn new(
        fetcher: HttpFetcher,
        api_base: &str,
        cookie: Option<String>,
        mode: CrawlMode,
    ) -> Self {
        Self {
            fetcher,
            signer: SignedRequestBuilder::new(api_base),
            cookie,
            mode,
        }
    }
}

#[async_trait]
impl SourceAdapter for PrimaryCommentAdapter {
    type Item = CommentThread;

    fn name(&self) -> &'static str {
        "video-comments"
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::first_offset()
    }

    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<CommentThread> {
        let Cursor::Offset(offset) = cursor else {
            return Page::failed(
                ParseError::InvalidValue {
                    field: "cursor",
                    value: cursor.to_string(),
                },
                None,
            );
        };

        // The signature covers the timestamp, so it is rebuilt per request.
        let request = self.signer.build_now(target, offset, self.mode);
        let headers = build_bilibili_headers(self.cookie.as_deref(), None);

        match self
            .fetcher
            .get_json::<MainReplyResponse>(&request.url, headers)
            .await
        {
            Ok(response) => response.into_page(),
            Err(e) => Page::failed(e, None),
        }
    }
}
