//! Video platform sources
//!
//! - [`PrimaryCommentAdapter`] - signed top-level comment API, offset cursor
//! - [`ReplyAdapter`] - per-root reply sub-resource, page index cursor
//! - [`SearchAdapter`] - keyword video search, page index cursor
//! - [`VideoResolver`] - BV id to object id and title lookup
//!
//! Comment and reply endpoints share one reply payload shape, deserialized
//! by [`RawReply`].

pub mod comment;
pub mod reply;
pub mod search;
pub mod video;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::models::{Author, CommentDraft, ReplyTarget};
use crate::utils::{first_integer, from_unix_secs, lenient_i64};

pub use comment::PrimaryCommentAdapter;
pub use reply::ReplyAdapter;
pub use search::SearchAdapter;
pub use video::VideoResolver;

/// Prefix of the provider's location string (`IP属地：广东`)
const LOCATION_PREFIX_CHARS: usize = 5;

lazy_static! {
    /// `回复 @name :` prefix of a reply-to-reply body
    static ref REPLY_TO_NAME: Regex =
        Regex::new(r"^回复\s*@([^\s:：]+)\s*[:：]").expect("Invalid regex pattern");
}

// ============================================================================
// Raw payloads
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLevelInfo {
    pub current_level: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVip {
    #[serde(rename = "vipStatus")]
    pub vip_status: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMember {
    pub uname: String,
    pub sex: String,
    pub avatar: String,
    pub sign: String,
    pub level_info: RawLevelInfo,
    pub vip: RawVip,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawContent {
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawReplyControl {
    pub sub_reply_entry_text: String,
    pub location: String,
}

/// One comment or reply as returned by the reply endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawReply {
    pub rpid: i64,
    pub root: i64,
    pub parent: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub mid: i64,
    pub member: RawMember,
    pub content: RawContent,
    pub ctime: i64,
    pub like: i64,
    pub rcount: i64,
    pub reply_control: RawReplyControl,
}

impl RawReply {
    /// Location without the fixed prefix; `None` when nothing follows it
    pub fn ip_location(&self) -> Option<String> {
        let location = &self.reply_control.location;
        if location.chars().count() > LOCATION_PREFIX_CHARS {
            Some(location.chars().skip(LOCATION_PREFIX_CHARS).collect())
        } else {
            None
        }
    }

    /// Reply count from `rcount`, falling back to the entry text
    pub fn reply_count(&self) -> i64 {
        if self.rcount > 0 {
            return self.rcount;
        }
        first_integer(&self.reply_control.sub_reply_entry_text).unwrap_or(0)
    }

    /// Replied-to comment when it is not the thread root
    pub fn reply_target(&self) -> Option<ReplyTarget> {
        if self.root == 0 || self.parent == 0 || self.parent == self.root {
            return None;
        }
        let name = REPLY_TO_NAME
            .captures(&self.content.message)
            .map(|c| c[1].to_string());
        Some(ReplyTarget {
            id: self.parent,
            name,
        })
    }

    pub fn to_draft(&self) -> CommentDraft {
        let member = &self.member;
        CommentDraft {
            id: self.rpid,
            author: Author {
                id: self.mid,
                name: member.uname.clone(),
                level: member.level_info.current_level,
                avatar: member.avatar.clone(),
                ip_location: self.ip_location(),
                device: None,
                gender: (!member.sex.is_empty()).then(|| member.sex.clone()),
                signature: (!member.sign.is_empty()).then(|| member.sign.clone()),
                authentication: None,
                is_vip: member.vip.vip_status != 0,
            },
            content: self.content.message.clone(),
            created_at: from_unix_secs(self.ctime),
            like_count: self.like,
            reply_count: self.reply_count(),
            floor: None,
            flags: Default::default(),
            reply_to: self.reply_target(),
        }
    }
}
