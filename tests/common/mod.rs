//! Common test utilities

use std::path::Path;
use std::sync::Arc;

use pinglun::config::{Config, EndpointConfig};
use pinglun::crawler::{Crawler, RateLimiter};
use pinglun::storage::{SharedRecordRepository, SqliteRecordRepository};
use serde_json::{json, Value};

pub const TEST_COOKIE: &str = "SESSDATA=test; buvid3=test";

/// Config pointing every upstream at the mock server
pub fn test_config(base: &str, db_path: &Path) -> Config {
    let mut config = Config::default();
    config.endpoints = EndpointConfig::all(base);
    config.database.sqlite_path = db_path.to_path_buf();
    config.crawler.request_delay_ms = 0;
    config.crawler.request_timeout_secs = 5;
    config
}

/// Crawler over an on-disk store with no pacing and a test credential
pub fn test_crawler(base: &str, db_path: &Path) -> Crawler {
    let repo: SharedRecordRepository = Arc::new(SqliteRecordRepository::new(db_path).unwrap());
    Crawler::new(test_config(base, db_path), repo)
        .unwrap()
        .with_cookie(Some(TEST_COOKIE.to_string()))
        .with_limiter(RateLimiter::unlimited())
}

/// One reply object as the video comment endpoints return it
pub fn reply_json(rpid: i64, root: i64, parent: i64, name: &str, rcount: i64) -> Value {
    json!({
        "rpid": rpid,
        "root": root,
        "parent": parent,
        "mid": rpid * 10,
        "ctime": 1_700_000_000 + rpid,
        "like": 1,
        "rcount": rcount,
        "member": {
            "uname": name,
            "sex": "保密",
            "avatar": format!("https://i0.hdslb.com/{rpid}.jpg"),
            "level_info": {"current_level": 5},
            "vip": {"vipStatus": 0}
        },
        "content": {"message": format!("comment {rpid}")},
        "reply_control": {"location": "IP属地：北京"}
    })
}

/// Primary comment page body
pub fn main_page(replies: Vec<Value>, next_offset: &str, is_end: bool) -> Value {
    json!({
        "code": 0,
        "message": "0",
        "data": {
            "cursor": {"is_end": is_end, "pagination_reply": {"next_offset": next_offset}},
            "replies": replies
        }
    })
}

/// Reply sub-page body
pub fn reply_page(replies: Vec<Value>) -> Value {
    json!({"code": 0, "message": "0", "data": {"replies": replies}})
}

/// Video page embedding the object id next to the BV id
pub fn video_page(aid: i64, bvid: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>{title}</title></head>
<body><script>window.__INITIAL_STATE__={{"aid":{aid},"bvid":"{bvid}","cid":42}}</script></body></html>"#
    )
}

/// Article comment page with `count` top-level comments starting at `first_id`
pub fn article_page(first_id: i64, count: usize) -> Value {
    let comments: Vec<Value> = (0..count as i64)
        .map(|i| {
            let id = first_id + i;
            json!({
                "comment_id": id,
                "create_time": 1_714_521_600_000_i64 + i,
                "content": format!("article comment {id}"),
                "support_count": i,
                "user_id": 1000 + id,
                "nickname": format!("user{id}"),
                "floorNumber": i + 1,
                "repliesCount": 1,
                "replies": [{
                    "rootId": id,
                    "replyId": id * 100,
                    "createTime": 1_714_521_700_000_i64,
                    "replyContent": "reply",
                    "userId": 1,
                    "userName": "replier",
                    "objectCommentId": id,
                    "objectUserName": format!("user{id}")
                }]
            })
        })
        .collect();

    json!({"errorCode": 0, "errorMessage": "", "result": {"commentsCount": count, "comments": comments}})
}

/// First news listing page in the HTML layout
#[allow(dead_code)]
pub fn news_html(ids: &[i64], load_more: bool) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li data-id="{id}" data-toplinetime="2024-05-01 10:00">
<a href="https://wap.gamersky.com/news/{id}.html"><div class="titleAndTime"><h5>News {id}</h5><time>10:00</time></div>
<span class="commentNum">3</span><img src="https://img.gamersky.com/{id}.jpg"></a></li>"#
            )
        })
        .collect();
    let more = if load_more {
        r#"<a class="clickLoadMoreBtn" data-num="2">加载更多</a>"#
    } else {
        ""
    };
    format!("<html><body><ul>{items}</ul>{more}</body></html>")
}

/// Index API body for later news pages
#[allow(dead_code)]
pub fn news_index(ids: &[i64]) -> Value {
    let result: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "ArticleID": id,
                "Title": format!("Indexed {id}"),
                "WapTopLineTimeTodayLabel": "昨天",
                "WapArticleUrl": format!("https://wap.gamersky.com/news/{id}.html"),
                "WapSanTuArticlePic": format!("<img src=\"https://img.gamersky.com/{id}.jpg\">"),
                "TopLineTime": "2024-04-30 09:00"
            })
        })
        .collect();
    json!({"errorCode": 0, "errorMessage": "", "result": result})
}
