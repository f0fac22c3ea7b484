//! Video comment crawls against a mock upstream
//!
//! Covers video lookup, the signed primary endpoint, reply expansion and
//! the resulting parent/child linkage in the store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{main_page, reply_json, reply_page, test_crawler, video_page};
use pinglun::crawler::rate_limit::RecordingSleeper;
use pinglun::crawler::{CommentRunOptions, RateLimitPolicy, RateLimiter, StopReason};
use pinglun::models::{CommentSource, CrawlMode, Cursor};
use pinglun::storage::RecordRepository;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BVID: &str = "BV1xx411c7mD";
const OID: &str = "170001";

async fn mount_video_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/video/{BVID}/")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(video_page(170001, BVID, "测试视频")),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn options(with_replies: bool) -> CommentRunOptions {
    CommentRunOptions {
        mode: CrawlMode::Latest,
        with_replies,
        max_reply_pages: 10,
        max_pages: 0,
        resume_offset: None,
    }
}

/// Two top-level comments; the first reports 15 replies, fetched over two sub-pages
#[tokio::test]
async fn test_threads_with_reply_expansion() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("oid", OID))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 15), reply_json(11, 0, 0, "bob", 0)],
            "NEXT",
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"NEXT"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(Vec::new(), "", true)))
        .expect(1)
        .mount(&server)
        .await;

    let first: Vec<_> = (100..110).map(|id| reply_json(id, 10, 10, "fan", 0)).collect();
    let mut second: Vec<_> = (110..114).map(|id| reply_json(id, 10, 10, "fan", 0)).collect();
    let mut nested = reply_json(114, 10, 105, "carol", 0);
    nested["content"]["message"] = "回复 @fan :不同意".into();
    second.push(nested);

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/reply"))
        .and(query_param("root", "10"))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_page(first)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/reply"))
        .and(query_param("root", "10"))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_page(second)))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(true)).await.unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.stored, 17);
    assert_eq!(report.last_serial, 17);
    assert_eq!(report.stop, StopReason::Exhausted);
    assert!(report.next_cursor.is_none());

    let stored = crawler
        .repository()
        .comments_for(CommentSource::Video, BVID)
        .unwrap();
    assert_eq!(stored.len(), 17);

    // Root first, then its replies, then the next root
    assert_eq!(stored[0].id, 10);
    assert_eq!(stored[0].parent_id, 0);
    assert_eq!(stored[0].reply_count, 15);
    assert_eq!(stored[0].target_title.as_deref(), Some("测试视频"));
    assert_eq!(stored[0].author.ip_location.as_deref(), Some("北京"));
    assert!(stored[1..16].iter().all(|c| c.parent_id == 10));
    assert_eq!(stored[16].id, 11);
    assert!(stored[16].is_top_level());

    let nested = stored.iter().find(|c| c.id == 114).unwrap();
    assert_eq!(nested.answer_to_id, Some(105));
    assert_eq!(nested.answer_to_name.as_deref(), Some("fan"));

    let direct = stored.iter().find(|c| c.id == 100).unwrap();
    assert_eq!(direct.answer_to_id, None);
}

/// Reply sub-pages are capped even when the root reports many replies
#[tokio::test]
async fn test_reply_fan_out_is_capped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 10_000)],
            "0",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/reply"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply_page(vec![reply_json(200, 10, 10, "fan", 0)])),
        )
        .expect(3)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let mut opts = options(true);
    opts.max_reply_pages = 3;
    let report = crawler.video_comments(BVID, &opts).await.unwrap();

    // Three sub-pages return the same reply; the store keeps one row
    assert_eq!(report.stored, 2);
    assert_eq!(report.last_serial, 4);
}

/// A failed reply sub-page is counted in the video run's report
#[tokio::test]
async fn test_reply_page_errors_reach_report() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 5)],
            "",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/reply"))
        .and(query_param("root", "10"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"code": 12022, "message": "已经被删除了"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(true)).await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(report.stop, StopReason::Exhausted);
}

/// Without reply expansion no reply requests are issued
#[tokio::test]
async fn test_replies_disabled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 15)],
            "",
            true,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/reply"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_page(Vec::new())))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(false)).await.unwrap();

    assert_eq!(report.stored, 1);
}

/// A failing primary page stops the run and reports where to resume
#[tokio::test]
async fn test_transport_failure_reports_resume_cursor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 0)],
            "PAGE2",
            false,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"PAGE2"}"#))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(false)).await.unwrap();

    assert_eq!(report.stop, StopReason::TransportError);
    assert_eq!(report.next_cursor, Some(Cursor::Offset("PAGE2".to_string())));
    assert_eq!(report.stored, 1);
}

/// A provider code on a later page keeps the offset it was requested with
#[tokio::test]
async fn test_provider_failure_reports_resume_cursor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 0)],
            "PAGE2",
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"PAGE2"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"code": -352, "message": "风控校验失败"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(false)).await.unwrap();

    assert_eq!(report.stop, StopReason::PageError);
    assert_eq!(report.next_cursor, Some(Cursor::Offset("PAGE2".to_string())));
    assert_eq!(report.errors, 1);
    assert_eq!(report.stored, 1);
}

/// The end flag alone does not stop a run that still has an offset
#[tokio::test]
async fn test_end_flag_with_offset_fetches_next_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 0)],
            "PAGE2",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"PAGE2"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(11, 0, 0, "bob", 0)],
            "",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    let report = crawler.video_comments(BVID, &options(false)).await.unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.stored, 2);
    assert_eq!(report.stop, StopReason::Exhausted);
}

/// Reply sub-pages wait the base delay and stored replies count toward escalation
#[tokio::test]
async fn test_reply_pages_are_paced_and_escalation_fires() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    mount_video_page(&server).await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 15), reply_json(11, 0, 0, "bob", 0)],
            "NEXT",
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"NEXT"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(Vec::new(), "", true)))
        .expect(1)
        .mount(&server)
        .await;

    let first: Vec<_> = (100..110).map(|id| reply_json(id, 10, 10, "fan", 0)).collect();
    let second: Vec<_> = (110..115).map(|id| reply_json(id, 10, 10, "fan", 0)).collect();
    for (pn, replies) in [("1", first), ("2", second)] {
        Mock::given(method("GET"))
            .and(path("/x/v2/reply/reply"))
            .and(query_param("root", "10"))
            .and(query_param("pn", pn))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_page(replies)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let sleeper = Arc::new(RecordingSleeper::new());
    let policy = RateLimitPolicy {
        base_delay: Duration::from_millis(100),
        escalation_every: 5,
        escalation_factor: 10,
    };
    let crawler = test_crawler(&server.uri(), &db)
        .with_limiter(RateLimiter::with_sleeper(policy, sleeper.clone()));
    let report = crawler.video_comments(BVID, &options(true)).await.unwrap();

    assert_eq!(report.stored, 17);
    let base = Duration::from_millis(100);
    let pause = Duration::from_secs(1);
    // Main page, two reply pages, pauses at serials 5, 10 and 15, then the last main page
    assert_eq!(sleeper.sleeps(), vec![base, base, base, pause, pause, pause, base]);
}

/// A resumed run starts at the given offset and continues serial numbering
#[tokio::test]
async fn test_resume_continues_serials() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    Mock::given(method("GET"))
        .and(path(format!("/video/{BVID}/")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(video_page(170001, BVID, "测试视频")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":""}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(10, 0, 0, "alice", 0), reply_json(11, 0, 0, "bob", 0)],
            "",
            true,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .and(query_param("pagination_str", r#"{"offset":"PAGE2"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_page(
            vec![reply_json(12, 0, 0, "carol", 0)],
            "",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    crawler.video_comments(BVID, &options(false)).await.unwrap();

    let mut resumed = options(false);
    resumed.resume_offset = Some("PAGE2".to_string());
    let report = crawler.video_comments(BVID, &resumed).await.unwrap();

    assert_eq!(report.stored, 1);
    assert_eq!(report.last_serial, 3);
}

/// A video page without the object id fails before any comment request
#[tokio::test]
async fn test_unresolvable_video() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    Mock::given(method("GET"))
        .and(path(format!("/video/{BVID}/")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><title>404</title></html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/x/v2/reply/wbi/main"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = test_crawler(&server.uri(), &db);
    assert!(crawler.video_comments(BVID, &options(true)).await.is_err());
}

/// Signed endpoints refuse to run without a credential
#[tokio::test]
async fn test_missing_credential() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("pinglun.db");

    let crawler = test_crawler(&server.uri(), &db).with_cookie(None);
    let err = crawler.video_comments(BVID, &options(true)).await.unwrap_err();

    assert!(err.to_string().contains("Missing credential"));
}
