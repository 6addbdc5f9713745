use std::collections::BTreeMap;

use crate::layout::AnnotationHandle;
use crate::models::Author;
use crate::sequences::{CommentId, ReplyId};
use crate::util::content_path_is_under;

use super::Action;

/// Per-item lifecycle state. Drives which affordances the renderer offers
/// and which network operation (if any) is pending. Comments start in
/// `Creating`; replies never use it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    Creating,
    #[default]
    Default,
    Editing,
    Saving,
    SaveError,
    DeleteConfirm,
    Deleting,
    DeleteError,
}

impl Mode {
    /// A mode with a network operation in flight. Begin-operations refuse to
    /// start from these so retries cannot overlap a pending request.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Mode::Saving | Mode::Deleting)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommentReply {
    pub local_id: ReplyId,
    pub remote_id: Option<i64>,
    pub mode: Mode,
    pub author: Option<Author>,
    pub date: i64,
    /// Last-saved content.
    pub text: String,
    /// Content as last seen from the remote side; used to detect drift.
    pub original_text: String,
    /// In-progress edit buffer.
    pub new_text: String,
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
    pub local_id: CommentId,
    pub remote_id: Option<i64>,
    /// Dotted path of the anchored content field.
    pub contentpath: String,
    /// Sub-field anchor, usually a JSON-encoded range list. Empty string
    /// means the comment is anchored to the whole field.
    pub position: String,
    /// Opaque link back to the in-content marker owned by the layout side.
    pub annotation: Option<AnnotationHandle>,
    pub mode: Mode,
    pub author: Option<Author>,
    pub date: i64,
    pub text: String,
    pub original_text: String,
    pub new_text: String,
    /// Source excerpt the comment was raised against. Display-only.
    pub highlighted_text: String,
    pub deleted: bool,
    pub resolved: bool,
    pub resolved_date: Option<i64>,
    pub resolved_author: Option<Author>,
    pub replies: BTreeMap<ReplyId, CommentReply>,
    /// In-progress reply compose buffer.
    pub new_reply: String,
    /// Replies known to exist remotely but not hydrated locally.
    pub remote_reply_count: u32,
}

/// Partial update merged into a [`Comment`] by the reducer. `None` fields
/// are left untouched; double-`Option` fields can also clear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommentUpdate {
    pub mode: Option<Mode>,
    pub remote_id: Option<i64>,
    pub author: Option<Author>,
    pub date: Option<i64>,
    pub text: Option<String>,
    pub original_text: Option<String>,
    pub new_text: Option<String>,
    pub highlighted_text: Option<String>,
    pub deleted: Option<bool>,
    pub resolved: Option<bool>,
    pub resolved_date: Option<Option<i64>>,
    pub resolved_author: Option<Option<Author>>,
    pub annotation: Option<Option<AnnotationHandle>>,
    pub new_reply: Option<String>,
    pub remote_reply_count: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplyUpdate {
    pub mode: Option<Mode>,
    pub remote_id: Option<i64>,
    pub author: Option<Author>,
    pub date: Option<i64>,
    pub text: Option<String>,
    pub original_text: Option<String>,
    pub new_text: Option<String>,
    pub deleted: Option<bool>,
}

impl Comment {
    fn apply(&mut self, update: &CommentUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(remote_id) = update.remote_id {
            self.remote_id = Some(remote_id);
        }
        if let Some(author) = &update.author {
            self.author = Some(author.clone());
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(text) = &update.text {
            self.text = text.clone();
        }
        if let Some(original_text) = &update.original_text {
            self.original_text = original_text.clone();
        }
        if let Some(new_text) = &update.new_text {
            self.new_text = new_text.clone();
        }
        if let Some(highlighted_text) = &update.highlighted_text {
            self.highlighted_text = highlighted_text.clone();
        }
        if let Some(deleted) = update.deleted {
            self.deleted = deleted;
        }
        if let Some(resolved) = update.resolved {
            self.resolved = resolved;
        }
        if let Some(resolved_date) = update.resolved_date {
            self.resolved_date = resolved_date;
        }
        if let Some(resolved_author) = &update.resolved_author {
            self.resolved_author = resolved_author.clone();
        }
        if let Some(annotation) = update.annotation {
            self.annotation = annotation;
        }
        if let Some(new_reply) = &update.new_reply {
            self.new_reply = new_reply.clone();
        }
        if let Some(remote_reply_count) = update.remote_reply_count {
            self.remote_reply_count = remote_reply_count;
        }
    }
}

impl CommentReply {
    fn apply(&mut self, update: &ReplyUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(remote_id) = update.remote_id {
            self.remote_id = Some(remote_id);
        }
        if let Some(author) = &update.author {
            self.author = Some(author.clone());
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(text) = &update.text {
            self.text = text.clone();
        }
        if let Some(original_text) = &update.original_text {
            self.original_text = original_text.clone();
        }
        if let Some(new_text) = &update.new_text {
            self.new_text = new_text.clone();
        }
        if let Some(deleted) = update.deleted {
            self.deleted = deleted;
        }
    }
}

/// Build a comment with the standard field defaults, then merge `options`.
/// `original_text` and `new_text` always start equal to `text`.
pub fn new_comment(
    contentpath: &str,
    position: &str,
    local_id: CommentId,
    annotation: Option<AnnotationHandle>,
    author: Option<Author>,
    date: i64,
    options: CommentUpdate,
) -> Comment {
    let mut comment = Comment {
        local_id,
        remote_id: None,
        contentpath: contentpath.to_string(),
        position: position.to_string(),
        annotation,
        mode: Mode::Default,
        author,
        date,
        text: String::new(),
        original_text: String::new(),
        new_text: String::new(),
        highlighted_text: String::new(),
        deleted: false,
        resolved: false,
        resolved_date: None,
        resolved_author: None,
        replies: BTreeMap::new(),
        new_reply: String::new(),
        remote_reply_count: 0,
    };
    comment.apply(&options);
    comment.original_text = comment.text.clone();
    comment.new_text = comment.text.clone();
    comment
}

pub fn new_comment_reply(
    local_id: ReplyId,
    author: Option<Author>,
    date: i64,
    options: ReplyUpdate,
) -> CommentReply {
    let mut reply = CommentReply {
        local_id,
        remote_id: None,
        mode: Mode::Default,
        author,
        date,
        text: String::new(),
        original_text: String::new(),
        new_text: String::new(),
        deleted: false,
    };
    reply.apply(&options);
    reply.original_text = reply.text.clone();
    reply.new_text = reply.text.clone();
    reply
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommentsState {
    /// Keyed by `local_id`; ids are monotonic so iteration order is
    /// insertion order.
    pub comments: BTreeMap<CommentId, Comment>,
    pub focused_comment: Option<CommentId>,
    /// Anchor-priority comment for the layout pass; decoupled from focus so
    /// clicking elsewhere can defocus without losing the pinned anchor.
    pub pinned_comment: Option<CommentId>,
    pub force_focus: bool,
}

pub(super) fn reduce(state: &CommentsState, action: &Action) -> CommentsState {
    let mut next = state.clone();
    match action {
        Action::AddComment(comment) => {
            next.comments.insert(comment.local_id, comment.clone());
        }
        Action::UpdateComment { local_id, update } => {
            if let Some(comment) = next.comments.get_mut(local_id) {
                comment.apply(update);
            }
        }
        Action::DeleteComment { local_id } => {
            let Some(comment) = next.comments.get_mut(local_id) else {
                return next;
            };
            if comment.remote_id.is_none() {
                // Never persisted; drop it outright.
                next.comments.remove(local_id);
            } else {
                comment.deleted = true;
            }
            if next.focused_comment == Some(*local_id) {
                next.focused_comment = None;
                next.force_focus = false;
            }
            if next.pinned_comment == Some(*local_id) {
                next.pinned_comment = None;
            }
        }
        Action::SetFocusedComment {
            local_id,
            update_pinned_comment,
            force_focus,
        } => {
            let exists = local_id.map_or(true, |id| next.comments.contains_key(&id));
            if exists {
                next.focused_comment = *local_id;
                next.force_focus = *force_focus;
                if *update_pinned_comment {
                    next.pinned_comment = *local_id;
                }
            }
        }
        Action::ResolveComment {
            local_id,
            author,
            date,
        } => {
            if let Some(comment) = next.comments.get_mut(local_id) {
                comment.resolved = true;
                comment.resolved_author = Some(author.clone());
                comment.resolved_date = Some(*date);
                comment.mode = Mode::Default;
            }
        }
        Action::ReopenComment { local_id } => {
            if let Some(comment) = next.comments.get_mut(local_id) {
                comment.resolved = false;
                comment.resolved_author = None;
                comment.resolved_date = None;
            }
        }
        Action::AddReply { comment_id, reply } => {
            if let Some(comment) = next.comments.get_mut(comment_id) {
                comment.replies.insert(reply.local_id, reply.clone());
            }
        }
        Action::UpdateReply {
            comment_id,
            reply_id,
            update,
        } => {
            if let Some(reply) = next
                .comments
                .get_mut(comment_id)
                .and_then(|c| c.replies.get_mut(reply_id))
            {
                reply.apply(update);
            }
        }
        Action::DeleteReply {
            comment_id,
            reply_id,
        } => {
            if let Some(comment) = next.comments.get_mut(comment_id) {
                let unsaved = comment
                    .replies
                    .get(reply_id)
                    .is_some_and(|r| r.remote_id.is_none());
                if unsaved {
                    comment.replies.remove(reply_id);
                } else if let Some(reply) = comment.replies.get_mut(reply_id) {
                    reply.deleted = true;
                }
            }
        }
        Action::InvalidateContentPath {
            content_path,
            author,
            date,
        } => {
            // The anchors under this path are gone; resolve the affected
            // comments and drop their stale annotation handles.
            for comment in next.comments.values_mut() {
                if content_path_is_under(&comment.contentpath, content_path) {
                    comment.resolved = true;
                    comment.resolved_author = Some(author.clone());
                    comment.resolved_date = Some(*date);
                    comment.annotation = None;
                }
            }
        }
        Action::UpdateGlobalSettings(_) => {}
    }
    next
}
