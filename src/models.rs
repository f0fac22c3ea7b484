// Core data structures for pinglun crawler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Comments
// ============================================================================

/// Which stream a comment was collected from (selects the storage table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSource {
    /// Video comment threads (signed primary API + reply sub-resource)
    Video,
    /// Article comment threads with nested replies
    Article,
}

impl CommentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
        }
    }
}

/// Ordering requested from the primary comment API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    #[default]
    Latest,
    Hot,
}

impl CrawlMode {
    /// Numeric `mode` query value understood by the API
    pub fn code(&self) -> u8 {
        match self {
            Self::Latest => 2,
            Self::Hot => 3,
        }
    }
}

impl FromStr for CrawlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latest" | "2" => Ok(Self::Latest),
            "hot" | "3" => Ok(Self::Hot),
            other => Err(format!("unknown crawl mode: {other}")),
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Hot => f.write_str("hot"),
        }
    }
}

/// Comment author as reported by the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub level: i32,
    pub avatar: String,
    pub ip_location: Option<String>,
    pub device: Option<String>,
    pub gender: Option<String>,
    pub signature: Option<String>,
    pub authentication: Option<String>,
    pub is_vip: bool,
}

/// Platform-specific markers on a comment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFlags {
    pub recommended: bool,
    pub by_author: bool,
    pub best: bool,
}

/// Replied-to target of a reply-to-reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub id: i64,
    pub name: Option<String>,
}

/// A normalized comment as it comes out of a source adapter
///
/// Drafts carry no serial number or linkage; the assembler decides both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub id: i64,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub reply_count: i64,
    pub floor: Option<i32>,
    pub flags: CommentFlags,
    /// Explicit replied-to target reported by the source, if any
    pub reply_to: Option<ReplyTarget>,
}

/// A top-level comment together with the replies known so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    pub root: CommentDraft,
    pub replies: Vec<CommentDraft>,
}

impl CommentThread {
    pub fn new(root: CommentDraft) -> Self {
        Self {
            root,
            replies: Vec::new(),
        }
    }
}

/// Persisted comment record
///
/// Identity is `(id, target_id)`. `parent_id == 0` marks a top-level comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub serial: u64,
    pub source: CommentSource,
    pub id: i64,
    /// Video BV id or article id
    pub target_id: String,
    pub target_title: Option<String>,
    pub parent_id: i64,
    pub answer_to_id: Option<i64>,
    pub answer_to_name: Option<String>,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub reply_count: i64,
    pub floor: Option<i32>,
    pub flags: CommentFlags,
    pub recorded_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id == 0
    }
}

// ============================================================================
// News and videos
// ============================================================================

/// News listing entry, keyed by source id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub sid: String,
    pub title: String,
    /// Display time as shown on the listing ("10:32", "昨天")
    pub time: String,
    pub comment_count: i64,
    pub url: String,
    pub image_url: String,
    pub topline_time: String,
    pub recorded_at: DateTime<Utc>,
}

/// Video search result, keyed by `(keyword, bvid)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub keyword: String,
    pub bvid: String,
    pub title: String,
    pub author: String,
    pub play: i64,
    pub video_review: i64,
    pub favorites: i64,
    pub like_count: i64,
    pub danmaku: i64,
    pub pubdate: Option<DateTime<Utc>>,
    pub duration: String,
    pub description: String,
    pub pic: String,
    pub recorded_at: DateTime<Utc>,
}

/// Object id and title resolved from a video page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub bvid: String,
    pub oid: String,
    pub title: String,
}

// ============================================================================
// Pagination
// ============================================================================

/// Continuation token for one logical stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cursor {
    /// Opaque string offset; `""` starts the stream
    Offset(String),
    /// 1-based page index
    Page(u32),
}

impl Cursor {
    pub fn first_offset() -> Self {
        Self::Offset(String::new())
    }

    pub fn first_page() -> Self {
        Self::Page(1)
    }

    /// True for offset values that a source returns to signal the end
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Offset(offset) => offset.is_empty() || offset == "0",
            Self::Page(page) => *page == 0,
        }
    }

    /// Successor of a page-indexed cursor; offsets cannot be advanced locally
    pub fn advance(&self) -> Option<Self> {
        match self {
            Self::Page(page) => Some(Self::Page(page.saturating_add(1))),
            Self::Offset(_) => None,
        }
    }

    pub fn page_index(&self) -> Option<u32> {
        match self {
            Self::Page(page) => Some(*page),
            Self::Offset(_) => None,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset(offset) if offset.is_empty() => f.write_str("<start>"),
            Self::Offset(offset) => f.write_str(offset),
            Self::Page(page) => write!(f, "page {page}"),
        }
    }
}

/// Transient state of one crawl invocation
///
/// Owned by the orchestrator and threaded explicitly through each page.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRunState {
    pub target: String,
    pub cursor: Cursor,
    /// Last assigned serial number (0 before the first record)
    pub serial: u64,
    pub stored: u64,
    pub skipped: u64,
    /// Pages that failed, including nested reply runs
    pub errors: u32,
    pub pages: u32,
    pub page_cap: Option<u32>,
}

impl CrawlRunState {
    pub fn new(target: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            target: target.into(),
            cursor,
            serial: 0,
            stored: 0,
            skipped: 0,
            errors: 0,
            pages: 0,
            page_cap: None,
        }
    }

    pub fn with_page_cap(mut self, cap: u32) -> Self {
        self.page_cap = (cap > 0).then_some(cap);
        self
    }

    pub fn cap_reached(&self) -> bool {
        self.page_cap.is_some_and(|cap| self.pages >= cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_mode_codes() {
        assert_eq!(CrawlMode::Latest.code(), 2);
        assert_eq!(CrawlMode::Hot.code(), 3);
        assert_eq!("hot".parse::<CrawlMode>().unwrap(), CrawlMode::Hot);
        assert_eq!("2".parse::<CrawlMode>().unwrap(), CrawlMode::Latest);
        assert!("oldest".parse::<CrawlMode>().is_err());
    }

    #[test]
    fn test_offset_terminal_values() {
        assert!(Cursor::Offset(String::new()).is_terminal());
        assert!(Cursor::Offset("0".to_string()).is_terminal());
        assert!(!Cursor::Offset("CAESEDE3".to_string()).is_terminal());
        assert!(!Cursor::Page(3).is_terminal());
    }

    #[test]
    fn test_cursor_advance() {
        assert_eq!(Cursor::Page(1).advance(), Some(Cursor::Page(2)));
        assert_eq!(Cursor::first_offset().advance(), None);
    }

    #[test]
    fn test_run_state_page_cap() {
        let mut state = CrawlRunState::new("BV1xx", Cursor::first_page()).with_page_cap(2);
        assert!(!state.cap_reached());
        state.pages = 2;
        assert!(state.cap_reached());

        let unbounded = CrawlRunState::new("BV1xx", Cursor::first_page()).with_page_cap(0);
        assert_eq!(unbounded.page_cap, None);
    }
}
