//! Keyword video search

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::{build_bilibili_headers, SEARCH_REFERER};
use crate::crawler::{Page, SourceAdapter};
use crate::models::{Cursor, VideoRecord};
use crate::utils::error::{FetchError, ParseError};
use crate::utils::{from_unix_secs, lenient_i64, lenient_string, strip_tags};

const VIDEO_TYPE: &str = "video";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchVideo {
    #[serde(rename = "type")]
    pub kind: String,
    pub bvid: String,
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub author: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub play: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub video_review: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub favorites: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub pubdate: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub duration: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub like: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub danmaku: i64,
    pub description: String,
    pub pic: String,
}

impl RawSearchVideo {
    fn into_record(self, keyword: &str) -> VideoRecord {
        VideoRecord {
            keyword: keyword.to_string(),
            bvid: self.bvid,
            title: strip_tags(&self.title),
            author: self.author,
            play: self.play,
            video_review: self.video_review,
            favorites: self.favorites,
            like_count: self.like,
            danmaku: self.danmaku,
            pubdate: (self.pubdate > 0).then(|| from_unix_secs(self.pubdate)),
            duration: self.duration,
            description: strip_tags(&self.description),
            pic: self.pic,
            recorded_at: Utc::now(),
        }
    }
}

/// One result group; only `video` groups are kept
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchGroup {
    pub result_type: String,
    /// Group payloads differ by type, so items are decoded lazily
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchData {
    pub result: Vec<RawSearchGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<SearchData>,
}

impl SearchResponse {
    /// Video results for `keyword`, other result types dropped
    pub fn into_videos(self, keyword: &str) -> Result<Vec<VideoRecord>, FetchError> {
        if self.code != 0 {
            return Err(FetchError::Provider {
                code: self.code,
                message: self.message,
            });
        }

        let videos = self
            .data
            .unwrap_or_default()
            .result
            .into_iter()
            .filter(|group| group.result_type == VIDEO_TYPE)
            .flat_map(|group| group.data)
            .filter_map(|value| match serde_json::from_value::<RawSearchVideo>(value) {
                Ok(video) => Some(video),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping undecodable search entry");
                    None
                }
            })
            .filter(|video| video.kind == VIDEO_TYPE && !video.bvid.is_empty())
            .map(|video| video.into_record(keyword))
            .collect();

        Ok(videos)
    }
}

/// Search adapter; targets are keywords
#[derive(Debug, Clone)]
pub struct SearchAdapter {
    fetcher: HttpFetcher,
    api_base: String,
    cookie: Option<String>,
    page_size: u32,
}

impl SearchAdapter {
    pub fn new(
        fetcher: HttpFetcher,
        api_base: &str,
        cookie: Option<String>,
        page_size: u32,
    ) -> Self {
        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_string(),
            cookie,
            page_size,
        }
    }

    pub fn build_url(&self, keyword: &str, page: u32) -> String {
        format!(
            "{}/x/web-interface/wbi/search/all/v2?keyword={}&page={}&page_size={}&platform=pc",
            self.api_base,
            urlencoding::encode(keyword),
            page,
            self.page_size
        )
    }
}

#[async_trait]
impl SourceAdapter for SearchAdapter {
    type Item = VideoRecord;

    fn name(&self) -> &'static str {
        "video-search"
    }

    async fn fetch_page(&self, target: &str, cursor: &Cursor) -> Page<VideoRecord> {
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

        let url = self.build_url(target, page);
        let headers = build_bilibili_headers(self.cookie.as_deref(), Some(SEARCH_REFERER));

        let response = match self.fetcher.get_json::<SearchResponse>(&url, headers).await {
            Ok(response) => response,
            Err(e) => return Page::failed(e, next),
        };

        match response.into_videos(target) {
            Ok(videos) => {
                let has_more = !videos.is_empty();
                Page::new(videos, next, has_more)
            }
            Err(e) => Page::failed(e, next),
        }
    }
}
