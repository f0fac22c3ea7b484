//! Article comment adapter
//!
//! One GET per page with the JSON request embedded, URL-escaped, in the
//! `request` query parameter. The source gives no cursor, so a page is
//! assumed to have a successor exactly when it came back full.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::{build_gamersky_headers, GAMERSKY_REFERER};
use crate::crawler::{Page, SourceAdapter};
use crate::models::{Author, CommentDraft, CommentFlags, CommentThread, Cursor, ReplyTarget};
use crate::utils::error::{FetchError, ParseError};
use crate::utils::{from_unix_millis, lenient_i64};

/// Top-level comments per page
pub const ARTICLE_COMMENT_PAGE_SIZE: usize = 20;

/// Replies embedded per top-level comment
pub const REPLIES_MAX_COUNT: u32 = 10;

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest<'a> {
    pub article_id: &'a str,
    pub min_praises_count: u32,
    pub replies_max_count: u32,
    pub page_index: u32,
    pub page_size: usize,
    pub order: &'static str,
}

impl<'a> CommentRequest<'a> {
    pub fn page(article_id: &'a str, page_index: u32) -> Self {
        Self {
            article_id,
            min_praises_count: 0,
            replies_max_count: REPLIES_MAX_COUNT,
            page_index,
            page_size: ARTICLE_COMMENT_PAGE_SIZE,
            order: "tuiJian",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawArticleReply {
    pub root_id: i64,
    pub reply_id: i64,
    pub create_time: i64,
    pub reply_content: String,
    pub praises_count: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub user_id: i64,
    pub user_name: String,
    #[serde(rename = "userHeadImageURL")]
    pub user_head_image_url: String,
    pub device_name: String,
    pub user_level: i32,
    pub user_authentication: String,
    pub object_comment_id: i64,
    pub object_user_name: String,
    #[serde(rename = "is_author")]
    pub is_author: bool,
    #[serde(rename = "ip_location")]
    pub ip_location: String,
}

impl RawArticleReply {
    pub fn to_draft(&self) -> CommentDraft {
        let reply_to = (self.object_comment_id != 0).then(|| ReplyTarget {
            id: self.object_comment_id,
            name: non_empty(&self.object_user_name),
        });

        CommentDraft {
            id: self.reply_id,
            author: Author {
                id: self.user_id,
                name: self.user_name.clone(),
                level: self.user_level,
                avatar: self.user_head_image_url.clone(),
                ip_location: non_empty(&self.ip_location),
                device: non_empty(&self.device_name),
                gender: None,
                signature: None,
                authentication: non_empty(&self.user_authentication),
                is_vip: false,
            },
            content: self.reply_content.clone(),
            created_at: from_unix_millis(self.create_time),
            like_count: self.praises_count,
            reply_count: 0,
            floor: None,
            flags: CommentFlags {
                by_author: self.is_author,
                ..Default::default()
            },
            reply_to,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawArticleComment {
    pub comment_id: i64,
    pub create_time: i64,
    pub is_tuijian: bool,
    pub is_author: bool,
    pub is_best: bool,
    pub content: String,
    pub support_count: i64,
    pub ip_location: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub user_id: i64,
    pub nickname: String,
    pub img_url: String,
    #[serde(rename = "deviceName")]
    pub device_name: String,
    #[serde(rename = "userLevel")]
    pub user_level: i32,
    #[serde(rename = "userAuthentication")]
    pub user_authentication: String,
    #[serde(rename = "floorNumber")]
    pub floor_number: i32,
    pub replies: Option<Vec<RawArticleReply>>,
    #[serde(rename = "repliesCount")]
    pub replies_count: i64,
}

impl RawArticleComment {
    pub fn to_thread(&self) -> CommentThread {
        let root = CommentDraft {
            id: self.comment_id,
            author: Author {
                id: self.user_id,
                name: self.nickname.clone(),
                level: self.user_level,
                avatar: self.img_url.clone(),
                ip_location: non_empty(&self.ip_location),
                device: non_empty(&self.device_name),
                gender: None,
                signature: None,
                authentication: non_empty(&self.user_authentication),
                is_vip: false,
            },
            content: self.content.clone(),
            created_at: from_unix_millis(self.create_time),
            like_count: self.support_count,
            reply_count: self.replies_count,
            floor: (self.floor_number > 0).then_some(self.floor_number),
            flags: CommentFlags {
                recommended: self.is_tuijian,
                by_author: self.is_author,
                best: self.is_best,
            },
            reply_to: None,
        };

        let replies = self
            .replies
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(RawArticleReply::to_draft)
            .collect();

        CommentThread { root, replies }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentResult {
    pub comments_count: i64,
    pub comments: Option<Vec<RawArticleComment>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentResponse {
    pub error_code: i64,
    pub error_message: String,
    pub result: Option<CommentResult>,
}

impl CommentResponse {
    pub fn into_threads(self) -> Result<Vec<CommentThread>, FetchError> {
        if self.error_code != 0 {
            return Err(FetchError::Provider {
                code: self.error_code,
                message: self.error_message,
            });
        }
        Ok(self
            .result
            .and_then(|r| r.comments)
            .unwrap_or_default()
            .iter()
            .map(RawArticleComment::to_thread)
            .collect())
    }
}

/// Adapter for article comment threads; targets are article ids
#[derive(Debug, Clone)]
pub struct ArticleCommentAdapter {
    fetcher: HttpFetcher,
    comment_api_base: String,
}

impl ArticleCommentAdapter {
    pub fn new(fetcher: HttpFetcher, comment_api_base: &str) -> Self {
        Self {
            fetcher,
            comment_api_base: comment_api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_url(&self, article_id: &str, page: u32) -> Result<String, ParseError> {
        let request = serde_json::to_string(&CommentRequest::page(article_id, page))?;
        Ok(format!(
            "{}/appapi/GetArticleCommentWithClubStyle?request={}",
            self.comment_api_base,
            urlencoding::encode(&request)
        ))
    }
}

#[async_trait]
impl SourceAdapter for ArticleCommentAdapter {
    type Item = CommentThread;

    fn name(&self) -> &'static str {
        "article-comments"
    }

    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<CommentThread> {
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

        let url = match self.build_url(target, page) {
            Ok(url) => url,
            Err(e) => return Page::failed(e, None),
        };
        let headers = build_gamersky_headers(Some(GAMERSKY_REFERER));

        let response = match self.fetcher.get_json::<CommentResponse>(&url, headers).await {
            Ok(response) => response,
            Err(e) => return Page::failed(e, next),
        };

        match response.into_threads() {
            Ok(threads) => {
                let has_more = threads.len() >= ARTICLE_COMMENT_PAGE_SIZE;
                Page::new(threads, next, has_more)
            }
            Err(e) => Page::failed(e, next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "errorCode": 0,
        "result": {
            "commentsCount": 2,
            "comments": [
                {
                    "comment_id": 501, "create_time": 1714521600000, "is_tuijian": true,
                    "is_author": false, "is_best": true, "content": "好文", "support_count": 9,
                    "ip_location": "浙江", "user_id": 7, "nickname": "玩家A", "img_url": "a.png",
                    "deviceName": "iPhone", "userLevel": 12, "userAuthentication": "",
                    "floorNumber": 1, "repliesCount": 2,
                    "replies": [
                        {"rootId": 501, "replyId": 601, "createTime": 1714521700000,
                         "replyContent": "同意", "praisesCount": 1, "userId": 8, "userName": "玩家B",
                         "objectCommentId": 501, "objectUserName": "玩家A"},
                        {"rootId": 501, "replyId": 602, "createTime": 1714521800000,
                         "replyContent": "不同意", "userId": 9, "userName": "玩家C",
                         "objectCommentId": 601, "objectUserName": "玩家B", "is_author": true}
                    ]
                },
                {"comment_id": 502, "nickname": "玩家D", "replies": null}
            ]
        }
    }"#;

    #[test]
    fn test_threads_with_nested_replies() {
        let response: CommentResponse = serde_json::from_str(PAGE).unwrap();
        let threads = response.into_threads().unwrap();

        assert_eq!(threads.len(), 2);
        let first = &threads[0];
        assert_eq!(first.root.id, 501);
        assert!(first.root.flags.recommended && first.root.flags.best);
        assert_eq!(first.root.floor, Some(1));
        assert_eq!(first.root.author.device.as_deref(), Some("iPhone"));
        assert_eq!(first.root.author.authentication, None);
        assert_eq!(first.root.created_at, from_unix_millis(1_714_521_600_000));

        assert_eq!(first.replies.len(), 2);
        assert_eq!(first.replies[1].reply_to.as_ref().unwrap().id, 601);
        assert_eq!(
            first.replies[1].reply_to.as_ref().unwrap().name.as_deref(),
            Some("玩家B")
        );
        assert!(first.replies[1].flags.by_author);

        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn test_request_is_escaped_json() {
        let adapter =
            ArticleCommentAdapter::new(HttpFetcher::new().unwrap(), "https://cm.gamersky.com");
        let url = adapter.build_url("1690001", 2).unwrap();

        let encoded = url.split("request=").nth(1).unwrap();
        let decoded = urlencoding::decode(encoded).unwrap();
        let body: serde_json::Value = serde_json::from_str(&decoded).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "articleId": "1690001", "minPraisesCount": 0, "repliesMaxCount": 10,
                "pageIndex": 2, "pageSize": 20, "order": "tuiJian"
            })
        );
        assert!(!encoded.contains('{'));
    }

    #[test]
    fn test_error_code_is_provider_error() {
        let response: CommentResponse =
            serde_json::from_str(r#"{"errorCode":500,"errorMessage":"文章不存在"}"#).unwrap();
        assert!(matches!(
            response.into_threads(),
            Err(FetchError::Provider { code: 500, .. })
        ));
    }
}
