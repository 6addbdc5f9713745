//! Derived read-only views over [`State`]. All O(n) in the number of
//! comments, safe to call on every render.

use crate::sequences::CommentId;
use crate::state::{Comment, State};

/// All comments except soft-deleted ones, in insertion order.
pub fn select_comments(state: &State) -> Vec<&Comment> {
    state
        .comments
        .comments
        .values()
        .filter(|c| !c.deleted)
        .collect()
}

/// Comments anchored to one specific content path (deleted excluded).
pub fn select_comments_for_content_path<'a>(state: &'a State, contentpath: &str) -> Vec<&'a Comment> {
    state
        .comments
        .comments
        .values()
        .filter(|c| !c.deleted && c.contentpath == contentpath)
        .collect()
}

pub fn select_comment(state: &State, local_id: CommentId) -> Option<&Comment> {
    state.comments.comments.get(&local_id)
}

/// Whether the commenting feature is usable: switched on and an identity
/// is known.
pub fn select_enabled(state: &State) -> bool {
    state.settings.comments_enabled && state.settings.user.is_some()
}

pub fn select_focused(state: &State) -> Option<CommentId> {
    state.comments.focused_comment
}

/// True when anything would be lost by navigating away: an edit buffer that
/// differs from the saved text, or a comment that has never been saved.
pub fn select_is_dirty(state: &State) -> bool {
    state
        .comments
        .comments
        .values()
        .filter(|c| !c.deleted)
        .any(|c| c.text != c.new_text || c.remote_id.is_none())
}

pub fn select_comment_count(state: &State) -> usize {
    state
        .comments
        .comments
        .values()
        .filter(|c| !c.deleted)
        .count()
}

/// Replaces the host-page global flag the legacy integration used; exposed
/// through the normal state-read path instead.
pub fn select_has_unresolved_comments(state: &State) -> bool {
    state
        .comments
        .comments
        .values()
        .any(|c| !c.deleted && !c.resolved)
}

/// Non-deleted, unresolved comments; the "Active" tab.
pub fn filter_active_comments(comments: &[Comment]) -> Vec<&Comment> {
    comments
        .iter()
        .filter(|c| !c.deleted && !c.resolved)
        .collect()
}

/// Non-deleted, resolved comments; the "Resolved" tab.
pub fn filter_resolved_comments(comments: &[Comment]) -> Vec<&Comment> {
    comments
        .iter()
        .filter(|c| !c.deleted && c.resolved)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{new_comment, CommentUpdate};

    fn comment(local_id: u32, deleted: bool, resolved: bool) -> Comment {
        let mut c = new_comment("body", "", local_id, None, None, 0, CommentUpdate::default());
        c.remote_id = Some(local_id as i64);
        c.deleted = deleted;
        c.resolved = resolved;
        c
    }

    fn state_with(comments: Vec<Comment>) -> State {
        let mut state = State::default();
        for c in comments {
            state.comments.comments.insert(c.local_id, c);
        }
        state
    }

    #[test]
    fn test_active_and_resolved_partition_the_non_deleted_comments() {
        let all = vec![
            comment(1, false, false),
            comment(2, false, true),
            comment(3, true, false),
            comment(4, true, true),
            comment(5, false, false),
        ];
        let active = filter_active_comments(&all);
        let resolved = filter_resolved_comments(&all);

        let mut union: Vec<u32> = active
            .iter()
            .chain(resolved.iter())
            .map(|c| c.local_id)
            .collect();
        union.sort_unstable();
        assert_eq!(union, vec![1, 2, 5]);

        for c in &active {
            assert!(!resolved.iter().any(|r| r.local_id == c.local_id));
        }
    }

    #[test]
    fn test_select_comments_excludes_deleted() {
        let state = state_with(vec![comment(1, false, false), comment(2, true, false)]);
        let ids: Vec<u32> = select_comments(&state).iter().map(|c| c.local_id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(select_comment_count(&state), 1);
    }

    #[test]
    fn test_select_comments_for_content_path_matches_exactly() {
        let mut a = comment(1, false, false);
        a.contentpath = "body.abc".to_string();
        let mut b = comment(2, false, false);
        b.contentpath = "body.abcdef".to_string();
        let state = state_with(vec![a, b]);
        let ids: Vec<u32> = select_comments_for_content_path(&state, "body.abc")
            .iter()
            .map(|c| c.local_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_dirty_when_editing_or_never_saved() {
        let mut clean = state_with(vec![comment(1, false, false)]);
        assert!(!select_is_dirty(&clean));

        clean
            .comments
            .comments
            .get_mut(&1)
            .expect("comment")
            .new_text = "changed".to_string();
        assert!(select_is_dirty(&clean));

        let mut unsaved = comment(2, false, false);
        unsaved.remote_id = None;
        let state = state_with(vec![unsaved]);
        assert!(select_is_dirty(&state));
    }

    #[test]
    fn test_unresolved_flag_ignores_deleted_comments() {
        let state = state_with(vec![comment(1, true, false), comment(2, false, true)]);
        assert!(!select_has_unresolved_comments(&state));
        let state = state_with(vec![comment(3, false, false)]);
        assert!(select_has_unresolved_comments(&state));
    }
}
