//! Signed request construction for the primary comment endpoint
//!
//! The endpoint verifies a `w_rid` parameter: the MD5 of a canonical query
//! string followed by a fixed salt. The canonical string depends on the
//! request timestamp, so a URL must be rebuilt for every request.

use md5::{Digest, Md5};

use crate::models::CrawlMode;

/// Salt appended to the canonical query before hashing
pub const WBI_SALT: &str = "ea1db124af3c7062474693fa704f4ff8";

/// Fixed `web_location` value expected by the comment endpoint
pub const WEB_LOCATION: &str = "1315875";

/// Path of the signed comment endpoint
pub const MAIN_REPLY_PATH: &str = "/x/v2/reply/wbi/main";

/// A fully built signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub url: String,
    pub w_rid: String,
    pub wts: i64,
}

/// Builds signed primary comment URLs against a base URL
#[derive(Debug, Clone)]
pub struct SignedRequestBuilder {
    base_url: String,
}

impl SignedRequestBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL-encoded `{"offset":"<offset>"}`
    pub fn pagination_str(offset: &str) -> String {
        let json = serde_json::json!({ "offset": offset }).to_string();
        urlencoding::encode(&json).into_owned()
    }

    /// Fixed-order query string that gets signed
    pub fn canonical_query(mode: CrawlMode, oid: &str, offset: &str, wts: i64) -> String {
        format!(
            "mode={}&oid={}&pagination_str={}&plat=1&type=1&web_location={}&wts={}",
            mode.code(),
            oid,
            Self::pagination_str(offset),
            WEB_LOCATION,
            wts
        )
    }

    /// Hex MD5 of the canonical query plus salt
    pub fn sign(mode: CrawlMode, oid: &str, offset: &str, wts: i64) -> String {
        let mut hasher = Md5::new();
        hasher.update(Self::canonical_query(mode, oid, offset, wts).as_bytes());
        hasher.update(WBI_SALT.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Build the request URL for a given timestamp
    pub fn build(&self, oid: &str, offset: &str, mode: CrawlMode, wts: i64) -> SignedRequest {
        let w_rid = Self::sign(mode, oid, offset, wts);
        let url = format!(
            "{}{}?oid={}&type=1&mode={}&pagination_str={}&plat=1&web_location={}&w_rid={}&wts={}",
            self.base_url,
            MAIN_REPLY_PATH,
            oid,
            mode.code(),
            Self::pagination_str(offset),
            WEB_LOCATION,
            w_rid,
            wts
        );

        SignedRequest { url, w_rid, wts }
    }

    /// Build the request URL for the current wall-clock second
    pub fn build_now(&self, oid: &str, offset: &str, mode: CrawlMode) -> SignedRequest {
        self.build(oid, offset, mode, chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_str_encoding() {
        assert_eq!(
            SignedRequestBuilder::pagination_str(""),
            "%7B%22offset%22%3A%22%22%7D"
        );
    }

    #[test]
    fn test_canonical_query_order() {
        let query =
            SignedRequestBuilder::canonical_query(CrawlMode::Latest, "123", "", 1_700_000_000);
        assert_eq!(
            query,
            "mode=2&oid=123&pagination_str=%7B%22offset%22%3A%22%22%7D&plat=1&type=1&web_location=1315875&wts=1700000000"
        );
    }

    #[test]
    fn test_known_signature() {
        let w_rid = SignedRequestBuilder::sign(CrawlMode::Latest, "123", "", 1_700_000_000);
        assert_eq!(w_rid, "16bbc14a81fb16037cca095a6d19bcf8");
    }

    #[test]
    fn test_build_embeds_signature_and_timestamp() {
        let builder = SignedRequestBuilder::new("https://api.bilibili.com/");
        let req = builder.build("123", "", CrawlMode::Latest, 1_700_000_000);

        assert_eq!(req.wts, 1_700_000_000);
        assert_eq!(req.w_rid, "16bbc14a81fb16037cca095a6d19bcf8");
        assert!(req
            .url
            .starts_with("https://api.bilibili.com/x/v2/reply/wbi/main?oid=123&type=1&mode=2"));
        assert!(req.url.contains("&w_rid=16bbc14a81fb16037cca095a6d19bcf8&wts=1700000000"));
    }

    #[test]
    fn test_timestamp_change_invalidates_signature() {
        let a = SignedRequestBuilder::sign(CrawlMode::Hot, "99", "abc", 1_700_000_000);
        let b = SignedRequestBuilder::sign(CrawlMode::Hot, "99", "abc", 1_700_000_001);
        assert_ne!(a, b);
    }

    #[test]
    fn test_offset_with_quotes_stays_valid_json() {
        let encoded = SignedRequestBuilder::pagination_str(r#"{"type":1}"#);
        let decoded = urlencoding::decode(&encoded).unwrap();
        let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value["offset"], r#"{"type":1}"#);
    }
}
