use std::sync::atomic::{AtomicU32, Ordering};

/// Session-local comment identifier. Distinct from the server-assigned
/// `remote_id` a comment acquires once saved.
pub type CommentId = u32;
pub type ReplyId = u32;

// Independent counters. Ids are session-local only and never persisted;
// the first call of each returns 1.
static NEXT_COMMENT_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_REPLY_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_comment_id() -> CommentId {
    NEXT_COMMENT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_reply_id() -> ReplyId {
    NEXT_REPLY_ID.fetch_add(1, Ordering::Relaxed)
}
