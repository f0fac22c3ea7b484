use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT};

/// User agent presented to the video platform
pub const BILIBILI_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:135.0) Gecko/20100101 Firefox/135.0";

/// User agent presented to the news site
pub const GAMERSKY_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Referer expected by the video search endpoint
pub const SEARCH_REFERER: &str = "https://search.bilibili.com/";

/// Referer expected by the article comment endpoint
pub const GAMERSKY_REFERER: &str = "https://www.gamersky.com/";

fn insert_if_valid(headers: &mut HeaderMap, name: reqwest::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, "Dropping header with invalid characters"),
    }
}

/// Build headers for video platform requests
///
/// # Arguments
///
/// * `cookie` - Credential token sent as the `Cookie` header
/// * `referer` - Optional referer URL
///
/// # Examples
///
/// ```
/// use pinglun::crawler::headers::build_bilibili_headers;
///
/// let headers = build_bilibili_headers(Some("SESSDATA=x"), None);
/// assert!(headers.contains_key("cookie"));
/// ```
pub fn build_bilibili_headers(cookie: Option<&str>, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(BILIBILI_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        insert_if_valid(&mut headers, COOKIE, cookie);
    }
    if let Some(referer) = referer {
        insert_if_valid(&mut headers, REFERER, referer);
    }

    headers
}

/// Build headers for news site requests
pub fn build_gamersky_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(GAMERSKY_USER_AGENT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    if let Some(referer) = referer {
        insert_if_valid(&mut headers, REFERER, referer);
    }

    headers
}
