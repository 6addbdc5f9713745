//! Reconciles local comment state with the remote workflow API.
//!
//! Every operation is split into a synchronous `begin_*` step that moves the
//! item into an in-flight mode and plans the network call, and a `finish_*`
//! step that folds the outcome back into the store. The `spawn_local` glue
//! between them lives in the thin public functions, so the state transitions
//! stay testable without a transport.

use std::rc::Rc;

use wasm_bindgen_futures::spawn_local;

use crate::api::{ApiClient, ApiResult, NewCommentRequest};
use crate::sequences::{next_reply_id, CommentId, ReplyId};
use crate::util::{now_ms, report_error};

use super::{new_comment_reply, Action, CommentUpdate, Mode, ReplyUpdate, Store};

pub(crate) enum SavePlan {
    Create(NewCommentRequest),
    CreateReply {
        parent_remote_id: i64,
        new_text: String,
    },
    Update {
        remote_id: i64,
        new_text: String,
    },
    /// Nothing to send: the API is switched off, or (for replies) the parent
    /// comment has never been saved.
    LocalOnly,
}

/// Move a comment into `Saving` and plan the request. Returns `None` when
/// the comment is unknown or already has a request in flight.
pub(crate) fn begin_save_comment(
    store: &Store,
    local_id: CommentId,
) -> Option<(ApiClient, SavePlan)> {
    let planned = store.with_state(|state| {
        let comment = state.comments.comments.get(&local_id)?;
        if comment.mode.is_in_flight() {
            return None;
        }
        let client = ApiClient::from_settings(&state.settings);
        let plan = if !state.settings.api_enabled {
            SavePlan::LocalOnly
        } else if let Some(remote_id) = comment.remote_id {
            SavePlan::Update {
                remote_id,
                new_text: comment.new_text.clone(),
            }
        } else {
            SavePlan::Create(NewCommentRequest {
                new_text: comment.new_text.clone(),
                contentpath: comment.contentpath.clone(),
                position: comment.position.clone(),
                highlighted_text: comment.highlighted_text.clone(),
            })
        };
        Some((client, plan))
    })?;

    store.dispatch(Action::UpdateComment {
        local_id,
        update: CommentUpdate {
            mode: Some(Mode::Saving),
            ..Default::default()
        },
    });
    Some(planned)
}

/// Fold a save outcome back in. On success the edit buffer becomes the saved
/// text and a freshly-created comment learns its remote id; on failure the
/// comment lands in `SaveError` with the buffer intact so the user can retry.
pub(crate) fn finish_save_comment(store: &Store, local_id: CommentId, result: ApiResult<Option<i64>>) {
    match result {
        Ok(remote_id) => {
            let Some(new_text) =
                store.with_state(|s| s.comments.comments.get(&local_id).map(|c| c.new_text.clone()))
            else {
                return;
            };
            store.dispatch(Action::UpdateComment {
                local_id,
                update: CommentUpdate {
                    mode: Some(Mode::Default),
                    remote_id,
                    text: Some(new_text.clone()),
                    original_text: Some(new_text),
                    ..Default::default()
                },
            });
        }
        Err(e) => {
            report_error("save comment", &e.to_string());
            store.dispatch(Action::UpdateComment {
                local_id,
                update: CommentUpdate {
                    mode: Some(Mode::SaveError),
                    ..Default::default()
                },
            });
        }
    }
}

pub fn save_comment(store: &Rc<Store>, local_id: CommentId) {
    let Some((client, plan)) = begin_save_comment(store, local_id) else {
        return;
    };
    match plan {
        SavePlan::LocalOnly => finish_save_comment(store, local_id, Ok(None)),
        SavePlan::Update { remote_id, new_text } => {
            let store = store.clone();
            spawn_local(async move {
                let result = client.update_comment(remote_id, &new_text).await.map(|_| None);
                finish_save_comment(&store, local_id, result);
            });
        }
        SavePlan::Create(request) => {
            let store = store.clone();
            spawn_local(async move {
                let result = client.create_comment(&request).await.map(Some);
                finish_save_comment(&store, local_id, result);
            });
        }
        // Comments never plan this variant.
        SavePlan::CreateReply { .. } => finish_save_comment(store, local_id, Ok(None)),
    }
}

/// Move a comment into `Deleting` and plan the request. `None` in the second
/// slot means there is nothing remote to delete and the caller should finish
/// immediately.
pub(crate) fn begin_delete_comment(
    store: &Store,
    local_id: CommentId,
) -> Option<(ApiClient, Option<i64>)> {
    let planned = store.with_state(|state| {
        let comment = state.comments.comments.get(&local_id)?;
        if comment.mode.is_in_flight() {
            return None;
        }
        let target = if state.settings.api_enabled {
            comment.remote_id
        } else {
            None
        };
        Some((ApiClient::from_settings(&state.settings), target))
    })?;

    store.dispatch(Action::UpdateComment {
        local_id,
        update: CommentUpdate {
            mode: Some(Mode::Deleting),
            ..Default::default()
        },
    });
    Some(planned)
}

pub(crate) fn finish_delete_comment(store: &Store, local_id: CommentId, result: ApiResult<()>) {
    match result {
        Ok(()) => store.dispatch(Action::DeleteComment { local_id }),
        Err(e) => {
            report_error("delete comment", &e.to_string());
            store.dispatch(Action::UpdateComment {
                local_id,
                update: CommentUpdate {
                    mode: Some(Mode::DeleteError),
                    ..Default::default()
                },
            });
        }
    }
}

pub fn delete_comment(store: &Rc<Store>, local_id: CommentId) {
    let Some((client, target)) = begin_delete_comment(store, local_id) else {
        return;
    };
    match target {
        None => finish_delete_comment(store, local_id, Ok(())),
        Some(remote_id) => {
            let store = store.clone();
            spawn_local(async move {
                let result = client.delete_comment(remote_id).await;
                finish_delete_comment(&store, local_id, result);
            });
        }
    }
}

/// Resolve a comment on behalf of the current user. The local transition is
/// applied synchronously; the remote call is fire-and-forget, since a
/// resolution that fails to propagate is re-derivable from the next load.
/// Without a known user this does nothing.
pub fn resolve_comment(store: &Rc<Store>, local_id: CommentId) {
    let planned = store.with_state(|state| {
        let user = state.settings.user.clone()?;
        let comment = state.comments.comments.get(&local_id)?;
        let target = if state.settings.api_enabled {
            comment.remote_id
        } else {
            None
        };
        Some((user, target, ApiClient::from_settings(&state.settings)))
    });
    let Some((user, target, client)) = planned else {
        return;
    };

    store.dispatch(Action::ResolveComment {
        local_id,
        author: user,
        date: now_ms(),
    });
    if let Some(remote_id) = target {
        spawn_local(async move {
            if let Err(e) = client.resolve_comment(remote_id).await {
                report_error("resolve comment", &e.to_string());
            }
        });
    }
}

/// Reopen a resolved comment. Same fire-and-forget shape as resolution.
pub fn reopen_comment(store: &Rc<Store>, local_id: CommentId) {
    let planned = store.with_state(|state| {
        let comment = state.comments.comments.get(&local_id)?;
        let target = if state.settings.api_enabled {
            comment.remote_id
        } else {
            None
        };
        Some((target, ApiClient::from_settings(&state.settings)))
    });
    let Some((target, client)) = planned else {
        return;
    };

    store.dispatch(Action::ReopenComment { local_id });
    if let Some(remote_id) = target {
        spawn_local(async move {
            if let Err(e) = client.reopen_comment(remote_id).await {
                report_error("reopen comment", &e.to_string());
            }
        });
    }
}

/// Turn the comment's reply compose buffer into a reply and save it. Empty
/// buffers are ignored.
pub fn post_reply(store: &Rc<Store>, comment_id: CommentId) {
    let text = store.with_state(|state| {
        state
            .comments
            .comments
            .get(&comment_id)
            .map(|c| c.new_reply.clone())
    });
    let Some(text) = text else { return };
    if text.trim().is_empty() {
        return;
    }

    let user = store.with_state(|s| s.settings.user.clone());
    let reply_id = next_reply_id();
    store.dispatch(Action::AddReply {
        comment_id,
        reply: new_comment_reply(
            reply_id,
            user,
            now_ms(),
            ReplyUpdate {
                text: Some(text),
                ..Default::default()
            },
        ),
    });
    store.dispatch(Action::UpdateComment {
        local_id: comment_id,
        update: CommentUpdate {
            new_reply: Some(String::new()),
            ..Default::default()
        },
    });
    save_reply(store, comment_id, reply_id);
}

pub(crate) fn begin_save_reply(
    store: &Store,
    comment_id: CommentId,
    reply_id: ReplyId,
) -> Option<(ApiClient, SavePlan)> {
    let planned = store.with_state(|state| {
        let comment = state.comments.comments.get(&comment_id)?;
        let reply = comment.replies.get(&reply_id)?;
        if reply.mode.is_in_flight() {
            return None;
        }
        let client = ApiClient::from_settings(&state.settings);
        let plan = if !state.settings.api_enabled {
            SavePlan::LocalOnly
        } else if let Some(remote_id) = reply.remote_id {
            SavePlan::Update {
                remote_id,
                new_text: reply.new_text.clone(),
            }
        } else if let Some(parent_remote_id) = comment.remote_id {
            // Creation goes through the parent comment's remote id.
            SavePlan::CreateReply {
                parent_remote_id,
                new_text: reply.new_text.clone(),
            }
        } else {
            SavePlan::LocalOnly
        };
        Some((client, plan))
    })?;

    store.dispatch(Action::UpdateReply {
        comment_id,
        reply_id,
        update: ReplyUpdate {
            mode: Some(Mode::Saving),
            ..Default::default()
        },
    });
    Some(planned)
}

pub(crate) fn finish_save_reply(
    store: &Store,
    comment_id: CommentId,
    reply_id: ReplyId,
    result: ApiResult<Option<i64>>,
) {
    match result {
        Ok(remote_id) => {
            let new_text = store.with_state(|s| {
                s.comments
                    .comments
                    .get(&comment_id)
                    .and_then(|c| c.replies.get(&reply_id))
                    .map(|r| r.new_text.clone())
            });
            let Some(new_text) = new_text else { return };
            store.dispatch(Action::UpdateReply {
                comment_id,
                reply_id,
                update: ReplyUpdate {
                    mode: Some(Mode::Default),
                    remote_id,
                    text: Some(new_text.clone()),
                    original_text: Some(new_text),
                    ..Default::default()
                },
            });
        }
        Err(e) => {
            report_error("save reply", &e.to_string());
            store.dispatch(Action::UpdateReply {
                comment_id,
                reply_id,
                update: ReplyUpdate {
                    mode: Some(Mode::SaveError),
                    ..Default::default()
                },
            });
        }
    }
}

pub fn save_reply(store: &Rc<Store>, comment_id: CommentId, reply_id: ReplyId) {
    let Some((client, plan)) = begin_save_reply(store, comment_id, reply_id) else {
        return;
    };
    match plan {
        SavePlan::LocalOnly => finish_save_reply(store, comment_id, reply_id, Ok(None)),
        SavePlan::Update { remote_id, new_text } => {
            let store = store.clone();
            spawn_local(async move {
                let result = client.update_reply(remote_id, &new_text).await.map(|_| None);
                finish_save_reply(&store, comment_id, reply_id, result);
            });
        }
        SavePlan::CreateReply {
            parent_remote_id,
            new_text,
        } => {
            let store = store.clone();
            spawn_local(async move {
                let result = client
                    .add_reply(parent_remote_id, &new_text)
                    .await
                    .map(Some);
                finish_save_reply(&store, comment_id, reply_id, result);
            });
        }
        // Replies never plan this variant.
        SavePlan::Create(_) => finish_save_reply(store, comment_id, reply_id, Ok(None)),
    }
}

pub(crate) fn begin_delete_reply(
    store: &Store,
    comment_id: CommentId,
    reply_id: ReplyId,
) -> Option<(ApiClient, Option<i64>)> {
    let planned = store.with_state(|state| {
        let reply = state
            .comments
            .comments
            .get(&comment_id)?
            .replies
            .get(&reply_id)?;
        if reply.mode.is_in_flight() {
            return None;
        }
        let target = if state.settings.api_enabled {
            reply.remote_id
        } else {
            None
        };
        Some((ApiClient::from_settings(&state.settings), target))
    })?;

    store.dispatch(Action::UpdateReply {
        comment_id,
        reply_id,
        update: ReplyUpdate {
            mode: Some(Mode::Deleting),
            ..Default::default()
        },
    });
    Some(planned)
}

pub(crate) fn finish_delete_reply(
    store: &Store,
    comment_id: CommentId,
    reply_id: ReplyId,
    result: ApiResult<()>,
) {
    match result {
        Ok(()) => store.dispatch(Action::DeleteReply {
            comment_id,
            reply_id,
        }),
        Err(e) => {
            report_error("delete reply", &e.to_string());
            store.dispatch(Action::UpdateReply {
                comment_id,
                reply_id,
                update: ReplyUpdate {
                    mode: Some(Mode::DeleteError),
                    ..Default::default()
                },
            });
        }
    }
}

pub fn delete_reply(store: &Rc<Store>, comment_id: CommentId, reply_id: ReplyId) {
    let Some((client, target)) = begin_delete_reply(store, comment_id, reply_id) else {
        return;
    };
    match target {
        None => finish_delete_reply(store, comment_id, reply_id, Ok(())),
        Some(remote_id) => {
            let store = store.clone();
            spawn_local(async move {
                let result = client.delete_reply(remote_id).await;
                finish_delete_reply(&store, comment_id, reply_id, result);
            });
        }
    }
}
