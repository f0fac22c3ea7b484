//! Comment thread assembly
//!
//! Turns a [`CommentThread`] into flat [`Comment`] records: the root gets
//! `parent_id = 0`, each reply points at the root, and reply-to-reply
//! targets become `answer_to_*`. Serial numbers continue from the caller's
//! counter and are only consumed by records that are kept.

use chrono::{DateTime, Utc};

use crate::models::{Comment, CommentDraft, CommentSource, CommentThread};

/// Output of assembling one thread
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Root first, then replies in fetch order
    pub comments: Vec<Comment>,
    /// Last serial number assigned (unchanged when nothing was kept)
    pub serial: u64,
    /// Drafts dropped as malformed
    pub skipped: u64,
}

/// Assembles threads for one crawl target
#[derive(Debug, Clone)]
pub struct CommentTreeAssembler {
    source: CommentSource,
    target_id: String,
    target_title: Option<String>,
}

impl CommentTreeAssembler {
    pub fn new(source: CommentSource, target_id: impl Into<String>) -> Self {
        Self {
            source,
            target_id: target_id.into(),
            target_title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.target_title = Some(title.into());
        self
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// A draft without a natural id or author name cannot be stored
    pub fn is_malformed(draft: &CommentDraft) -> bool {
        draft.id == 0 || draft.author.name.trim().is_empty()
    }

    /// Assemble one thread starting after serial number `serial`
    pub fn assemble(
        &self,
        serial: u64,
        thread: CommentThread,
        recorded_at: DateTime<Utc>,
    ) -> Assembly {
        let CommentThread { root, replies } = thread;

        // Without a root id the replies have nothing to link to.
        if root.id == 0 {
            return Assembly {
                comments: Vec::new(),
                serial,
                skipped: 1 + replies.len() as u64,
            };
        }

        let root_id = root.id;
        let mut next_serial = serial;
        let mut skipped = 0;
        let mut comments = Vec::with_capacity(1 + replies.len());

        next_serial += 1;
        comments.push(self.to_comment(root, next_serial, 0, recorded_at));

        for reply in replies {
            if Self::is_malformed(&reply) {
                tracing::debug!(
                    root_id,
                    reply_id = reply.id,
                    "Skipping reply without id or author name"
                );
                skipped += 1;
                continue;
            }
            next_serial += 1;
            comments.push(self.to_comment(reply, next_serial, root_id, recorded_at));
        }

        Assembly {
            comments,
            serial: next_serial,
            skipped,
        }
    }

    fn to_comment(
        &self,
        draft: CommentDraft,
        serial: u64,
        parent_id: i64,
        recorded_at: DateTime<Utc>,
    ) -> Comment {
        let answer_to = if parent_id == 0 {
            None
        } else {
            draft
                .reply_to
                .filter(|target| target.id != 0 && target.id != parent_id)
        };

        Comment {
            serial,
            source: self.source,
            id: draft.id,
            target_id: self.target_id.clone(),
            target_title: self.target_title.clone(),
            parent_id,
            answer_to_id: answer_to.as_ref().map(|t| t.id),
            answer_to_name: answer_to.and_then(|t| t.name),
            author: draft.author,
            content: draft.content,
            created_at: draft.created_at,
            like_count: draft.like_count,
            reply_count: draft.reply_count,
            floor: draft.floor,
            flags: draft.flags,
            recorded_at,
        }
    }
}
