//! Integration tests for HttpFetcher using wiremock

use std::time::Duration;

use pinglun::crawler::headers::build_gamersky_headers;
use pinglun::crawler::HttpFetcher;
use pinglun::error::{ErrorCategory, PinglunErrorTrait};
use pinglun::utils::error::{CrawlerError, FetchError, ParseError};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct CodeOnly {
    code: i64,
}

#[tokio::test]
async fn test_get_text_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("referer", "https://www.gamersky.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let body = fetcher
        .get_text(
            &format!("{}/page", mock_server.uri()),
            build_gamersky_headers(Some("https://www.gamersky.com/")),
        )
        .await
        .unwrap();

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher
        .get_text(&format!("{}/missing", mock_server.uri()), HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ServerError(404)));
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::with_timeout(Duration::from_millis(200)).unwrap();
    let err = fetcher
        .get_text(&format!("{}/slow", mock_server.uri()), HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout));
}

#[tokio::test]
async fn test_get_json_shape_mismatch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>risk control</html>"))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let err = fetcher
        .get_json::<CodeOnly>(&format!("{}/api", mock_server.uri()), HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlerError::Parse(ParseError::Json(_))));
}

#[tokio::test]
async fn test_post_json_sends_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v6/GetWapIndex"))
        .and(body_json(serde_json::json!({"request": {"pageIndex": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 7})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let body: CodeOnly = fetcher
        .post_json(
            &format!("{}/v6/GetWapIndex", mock_server.uri()),
            HeaderMap::new(),
            &serde_json::json!({"request": {"pageIndex": 2}}),
        )
        .await
        .unwrap();

    assert_eq!(body.code, 7);
}
