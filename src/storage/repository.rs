//! Repository Pattern for Record Persistence
//!
//! This module provides a trait-based repository so crawl logic does not
//! depend on the storage backend:
//! - SQLite for production runs
//! - An in-memory mock for tests
//!
//! Every insert is insert-if-absent keyed by the record's natural identity.
//! An existing row is never updated, so re-crawling a page is a no-op.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pinglun::storage::repository::{RecordRepository, SqliteRecordRepository};
//!
//! let repo = SqliteRecordRepository::new("data/pinglun.db")?;
//! let inserted = repo.insert_news(&item)?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::{Author, Comment, CommentFlags, CommentSource, NewsItem, VideoRecord};
use crate::utils::{format_db_time, DB_TIME_FORMAT};

// ============================================================================
// Core Types
// ============================================================================

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub video_comments: u64,
    pub article_comments: u64,
    pub videos: u64,
    pub news: u64,
}

impl TableCounts {
    pub fn total(&self) -> u64 {
        self.video_comments + self.article_comments + self.videos + self.news
    }
}

/// Table holding comments of the given source
pub fn comment_table(source: CommentSource) -> &'static str {
    match source {
        CommentSource::Video => "video_comments",
        CommentSource::Article => "article_comments",
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Idempotent record store
///
/// Insert methods return `true` when a new row was written and `false`
/// when a row with the same natural identity already existed.
pub trait RecordRepository: Send + Sync {
    /// Insert a comment keyed by `(id, target_id)`
    fn insert_comment(&self, comment: &Comment) -> Result<bool>;

    /// Insert a news item keyed by `sid`
    fn insert_news(&self, item: &NewsItem) -> Result<bool>;

    /// Insert a search result keyed by `(keyword, bvid)`
    fn insert_video(&self, video: &VideoRecord) -> Result<bool>;

    /// All stored news ids in insertion order
    fn news_ids(&self) -> Result<Vec<String>>;

    /// Stored comments of one target ordered by serial number
    fn comments_for(&self, source: CommentSource, target_id: &str) -> Result<Vec<Comment>>;

    /// Stored search results of one keyword in insertion order
    fn videos_for(&self, keyword: &str) -> Result<Vec<VideoRecord>>;

    /// Row counts per table
    fn counts(&self) -> Result<TableCounts>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of RecordRepository
///
/// Holds a single connection for the lifetime of the crawler instance.
pub struct SqliteRecordRepository {
    conn: Mutex<Connection>,
}

impl SqliteRecordRepository {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        for source in [CommentSource::Video, CommentSource::Article] {
            let table = comment_table(source);
            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    comment_id INTEGER NOT NULL,
                    target_id TEXT NOT NULL,
                    target_title TEXT,
                    serial INTEGER NOT NULL,
                    parent_id INTEGER NOT NULL DEFAULT 0,
                    answer_to_id INTEGER,
                    answer_to_name TEXT,
                    user_id INTEGER NOT NULL DEFAULT 0,
                    username TEXT NOT NULL,
                    user_level INTEGER NOT NULL DEFAULT 0,
                    avatar TEXT NOT NULL DEFAULT '',
                    ip_location TEXT,
                    device_name TEXT,
                    gender TEXT,
                    signature TEXT,
                    authentication TEXT,
                    is_vip INTEGER NOT NULL DEFAULT 0,
                    content TEXT NOT NULL,
                    comment_time TEXT NOT NULL,
                    like_count INTEGER NOT NULL DEFAULT 0,
                    reply_count INTEGER NOT NULL DEFAULT 0,
                    floor_number INTEGER,
                    is_recommended INTEGER NOT NULL DEFAULT 0,
                    is_author INTEGER NOT NULL DEFAULT 0,
                    is_best INTEGER NOT NULL DEFAULT 0,
                    create_time TEXT NOT NULL,
                    UNIQUE(comment_id, target_id)
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_target
                    ON {table}(target_id, serial);

                CREATE INDEX IF NOT EXISTS idx_{table}_parent
                    ON {table}(parent_id);
                "#
            ))
            .with_context(|| format!("Failed to create table {table}"))?;
        }

        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS video_search_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    keyword TEXT NOT NULL,
                    bvid TEXT NOT NULL,
                    title TEXT NOT NULL,
                    author TEXT NOT NULL DEFAULT '',
                    play INTEGER NOT NULL DEFAULT 0,
                    video_review INTEGER NOT NULL DEFAULT 0,
                    favorites INTEGER NOT NULL DEFAULT 0,
                    like_count INTEGER NOT NULL DEFAULT 0,
                    danmaku INTEGER NOT NULL DEFAULT 0,
                    pubdate TEXT,
                    duration TEXT NOT NULL DEFAULT '',
                    description TEXT NOT NULL DEFAULT '',
                    pic TEXT NOT NULL DEFAULT '',
                    create_time TEXT NOT NULL,
                    UNIQUE(keyword, bvid)
                );

                CREATE TABLE IF NOT EXISTS news_items (
                    sid TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    time TEXT NOT NULL DEFAULT '',
                    comment_num INTEGER NOT NULL DEFAULT 0,
                    url TEXT NOT NULL DEFAULT '',
                    image_url TEXT NOT NULL DEFAULT '',
                    topline_time TEXT NOT NULL DEFAULT '',
                    create_time TEXT NOT NULL
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .with_context(|| format!("Failed to count {table}"))?;
        Ok(count as u64)
    }
}

fn parse_db_time(value: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(value, DB_TIME_FORMAT)
        .map(|t| t.and_utc())
        .unwrap_or_default()
}

fn comment_from_row(source: CommentSource, row: &Row<'_>) -> rusqlite::Result<Comment> {
    let comment_time: String = row.get("comment_time")?;
    let create_time: String = row.get("create_time")?;
    let serial: i64 = row.get("serial")?;

    Ok(Comment {
        serial: serial as u64,
        source,
        id: row.get("comment_id")?,
        target_id: row.get("target_id")?,
        target_title: row.get("target_title")?,
        parent_id: row.get("parent_id")?,
        answer_to_id: row.get("answer_to_id")?,
        answer_to_name: row.get("answer_to_name")?,
        author: Author {
            id: row.get("user_id")?,
            name: row.get("username")?,
            level: row.get("user_level")?,
            avatar: row.get("avatar")?,
            ip_location: row.get("ip_location")?,
            device: row.get("device_name")?,
            gender: row.get("gender")?,
            signature: row.get("signature")?,
            authentication: row.get("authentication")?,
            is_vip: row.get("is_vip")?,
        },
        content: row.get("content")?,
        created_at: parse_db_time(&comment_time),
        like_count: row.get("like_count")?,
        reply_count: row.get("reply_count")?,
        floor: row.get("floor_number")?,
        flags: CommentFlags {
            recommended: row.get("is_recommended")?,
            by_author: row.get("is_author")?,
            best: row.get("is_best")?,
        },
        recorded_at: parse_db_time(&create_time),
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    let pubdate: Option<String> = row.get("pubdate")?;
    let create_time: String = row.get("create_time")?;

    Ok(VideoRecord {
        keyword: row.get("keyword")?,
        bvid: row.get("bvid")?,
        title: row.get("title")?,
        author: row.get("author")?,
        play: row.get("play")?,
        video_review: row.get("video_review")?,
        favorites: row.get("favorites")?,
        like_count: row.get("like_count")?,
        danmaku: row.get("danmaku")?,
        pubdate: pubdate.as_deref().map(parse_db_time),
        duration: row.get("duration")?,
        description: row.get("description")?,
        pic: row.get("pic")?,
        recorded_at: parse_db_time(&create_time),
    })
}

impl RecordRepository for SqliteRecordRepository {
    fn insert_comment(&self, c: &Comment) -> Result<bool> {
        let conn = self.lock()?;
        let table = comment_table(c.source);
        let inserted = conn
            .execute(
                &format!(
                    r#"
                INSERT OR IGNORE INTO {table} (
                    comment_id, target_id, target_title, serial, parent_id,
                    answer_to_id, answer_to_name, user_id, username, user_level,
                    avatar, ip_location, device_name, gender, signature,
                    authentication, is_vip, content, comment_time, like_count,
                    reply_count, floor_number, is_recommended, is_author, is_best,
                    create_time
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
                )
                "#
                ),
                params![
                    c.id,
                    c.target_id,
                    c.target_title,
                    c.serial as i64,
                    c.parent_id,
                    c.answer_to_id,
                    c.answer_to_name,
                    c.author.id,
                    c.author.name,
                    c.author.level,
                    c.author.avatar,
                    c.author.ip_location,
                    c.author.device,
                    c.author.gender,
                    c.author.signature,
                    c.author.authentication,
                    c.author.is_vip,
                    c.content,
                    format_db_time(&c.created_at),
                    c.like_count,
                    c.reply_count,
                    c.floor,
                    c.flags.recommended,
                    c.flags.by_author,
                    c.flags.best,
                    format_db_time(&c.recorded_at),
                ],
            )
            .with_context(|| format!("Failed to insert comment {} into {table}", c.id))?;

        Ok(inserted > 0)
    }

    fn insert_news(&self, item: &NewsItem) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO news_items
                    (sid, title, time, comment_num, url, image_url, topline_time, create_time)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    item.sid,
                    item.title,
                    item.time,
                    item.comment_count,
                    item.url,
                    item.image_url,
                    item.topline_time,
                    format_db_time(&item.recorded_at),
                ],
            )
            .with_context(|| format!("Failed to insert news {}", item.sid))?;

        Ok(inserted > 0)
    }

    fn insert_video(&self, v: &VideoRecord) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO video_search_results (
                    keyword, bvid, title, author, play, video_review, favorites,
                    like_count, danmaku, pubdate, duration, description, pic, create_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    v.keyword,
                    v.bvid,
                    v.title,
                    v.author,
                    v.play,
                    v.video_review,
                    v.favorites,
                    v.like_count,
                    v.danmaku,
                    v.pubdate.as_ref().map(format_db_time),
                    v.duration,
                    v.description,
                    v.pic,
                    format_db_time(&v.recorded_at),
                ],
            )
            .with_context(|| format!("Failed to insert video {} for {}", v.bvid, v.keyword))?;

        Ok(inserted > 0)
    }

    fn news_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT sid FROM news_items ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read news ids")?;
        Ok(ids)
    }

    fn comments_for(&self, source: CommentSource, target_id: &str) -> Result<Vec<Comment>> {
        let conn = self.lock()?;
        let table = comment_table(source);
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {table} WHERE target_id = ?1 ORDER BY serial, comment_id"
        ))?;
        let comments = stmt
            .query_map(params![target_id], |row| comment_from_row(source, row))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read comments of {target_id}"))?;
        Ok(comments)
    }

    fn videos_for(&self, keyword: &str) -> Result<Vec<VideoRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT * FROM video_search_results WHERE keyword = ?1 ORDER BY id")?;
        let videos = stmt
            .query_map(params![keyword], video_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read videos of {keyword}"))?;
        Ok(videos)
    }

    fn counts(&self) -> Result<TableCounts> {
        let conn = self.lock()?;
        Ok(TableCounts {
            video_comments: Self::count_rows(&conn, "video_comments")?,
            article_comments: Self::count_rows(&conn, "article_comments")?,
            videos: Self::count_rows(&conn, "video_search_results")?,
            news: Self::count_rows(&conn, "news_items")?,
        })
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

#[derive(Default)]
struct MockState {
    comments: HashMap<(CommentSource, i64, String), Comment>,
    news: Vec<NewsItem>,
    videos: Vec<VideoRecord>,
}

/// In-memory implementation of RecordRepository for tests
#[derive(Default)]
pub struct MockRecordRepository {
    state: RwLock<MockState>,
}

impl MockRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MockState>> {
        self.state.read().map_err(|_| anyhow!("mock state poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MockState>> {
        self.state.write().map_err(|_| anyhow!("mock state poisoned"))
    }
}

impl RecordRepository for MockRecordRepository {
    fn insert_comment(&self, comment: &Comment) -> Result<bool> {
        let mut state = self.write()?;
        let key = (comment.source, comment.id, comment.target_id.clone());
        if state.comments.contains_key(&key) {
            return Ok(false);
        }
        state.comments.insert(key, comment.clone());
        Ok(true)
    }

    fn insert_news(&self, item: &NewsItem) -> Result<bool> {
        let mut state = self.write()?;
        if state.news.iter().any(|n| n.sid == item.sid) {
            return Ok(false);
        }
        state.news.push(item.clone());
        Ok(true)
    }

    fn insert_video(&self, video: &VideoRecord) -> Result<bool> {
        let mut state = self.write()?;
        if state
            .videos
            .iter()
            .any(|v| v.keyword == video.keyword && v.bvid == video.bvid)
        {
            return Ok(false);
        }
        state.videos.push(video.clone());
        Ok(true)
    }

    fn news_ids(&self) -> Result<Vec<String>> {
        Ok(self.read()?.news.iter().map(|n| n.sid.clone()).collect())
    }

    fn comments_for(&self, source: CommentSource, target_id: &str) -> Result<Vec<Comment>> {
        let state = self.read()?;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.source == source && c.target_id == target_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.serial, c.id));
        Ok(comments)
    }

    fn videos_for(&self, keyword: &str) -> Result<Vec<VideoRecord>> {
        Ok(self
            .read()?
            .videos
            .iter()
            .filter(|v| v.keyword == keyword)
            .cloned()
            .collect())
    }

    fn counts(&self) -> Result<TableCounts> {
        let state = self.read()?;
        let count_source = |source| {
            state
                .comments
                .keys()
                .filter(|(s, _, _)| *s == source)
                .count() as u64
        };
        Ok(TableCounts {
            video_comments: count_source(CommentSource::Video),
            article_comments: count_source(CommentSource::Article),
            videos: state.videos.len() as u64,
            news: state.news.len() as u64,
        })
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository wrapper
pub type SharedRecordRepository = Arc<dyn RecordRepository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedRecordRepository> {
    let repo = SqliteRecordRepository::new(path)?;
    Ok(Arc::new(repo))
}

// ============================================================================
// Tests
// ============================================================================
