//! BV id lookup: object id and title from the public video page

use lazy_static::lazy_static;
use regex::Regex;

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::headers::build_bilibili_headers;
use crate::models::VideoInfo;
use crate::utils::error::{CrawlerError, ParseError};

/// Title stored when the page has none
pub const UNKNOWN_TITLE: &str = "未识别";

lazy_static! {
    static ref TITLE_RE: Regex =
        Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("Invalid regex pattern");
}

/// Extract the object id and title from a video page
///
/// The object id is the `aid` embedded next to the matching `bvid` in the
/// page's initial state.
pub fn parse_video_page(html: &str, bvid: &str) -> Result<VideoInfo, ParseError> {
    let pattern = format!(r#""aid":(\d+),"bvid":"{}""#, regex::escape(bvid));
    let oid_re = Regex::new(&pattern).map_err(|e| ParseError::Html(e.to_string()))?;

    let oid = oid_re
        .captures(html)
        .map(|c| c[1].to_string())
        .ok_or(ParseError::MissingField("aid"))?;

    let title = TITLE_RE
        .captures(html)
        .map(|c| html_escape::decode_html_entities(c[1].trim()).into_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    Ok(VideoInfo {
        bvid: bvid.to_string(),
        oid,
        title,
    })
}

/// Resolves BV ids against the video site
#[derive(Debug, Clone)]
pub struct VideoResolver {
    fetcher: HttpFetcher,
    www_base: String,
    cookie: Option<String>,
}

impl VideoResolver {
    pub fn new(fetcher: HttpFetcher, www_base: &str, cookie: Option<String>) -> Self {
        Self {
            fetcher,
            www_base: www_base.trim_end_matches('/').to_string(),
            cookie,
        }
    }

    pub async fn resolve(&self, bvid: &str) -> Result<VideoInfo, CrawlerError> {
        let url = format!("{}/video/{}/", self.www_base, bvid);
        let headers = build_bilibili_headers(self.cookie.as_deref(), None);

        let html = self.fetcher.get_text(&url, headers).await?;
        let info = parse_video_page(&html, bvid)?;

        tracing::info!(bvid = %info.bvid, oid = %info.oid, title = %info.title, "Resolved video");
        Ok(info)
    }
}
