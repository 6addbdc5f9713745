pub mod comment_sync;
pub(crate) mod comments;
pub(crate) mod settings;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::models::Author;
use crate::sequences::{CommentId, ReplyId};

pub use comments::{
    new_comment, new_comment_reply, Comment, CommentReply, CommentUpdate, CommentsState, Mode,
    ReplyUpdate,
};
pub use settings::{Settings, SettingsUpdate};

/// Whole-store state tree. Cloned on dispatch; subscribers always observe a
/// complete snapshot, never a partially-applied action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State {
    pub comments: CommentsState,
    pub settings: Settings,
}

/// The only mutation path into the store. Every variant is handled by the
/// pure reducers in `comments` and `settings`; actions naming an unknown
/// entity leave the state unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    AddComment(Comment),
    UpdateComment {
        local_id: CommentId,
        update: CommentUpdate,
    },
    DeleteComment {
        local_id: CommentId,
    },
    SetFocusedComment {
        local_id: Option<CommentId>,
        update_pinned_comment: bool,
        force_focus: bool,
    },
    ResolveComment {
        local_id: CommentId,
        author: Author,
        date: i64,
    },
    ReopenComment {
        local_id: CommentId,
    },
    AddReply {
        comment_id: CommentId,
        reply: CommentReply,
    },
    UpdateReply {
        comment_id: CommentId,
        reply_id: ReplyId,
        update: ReplyUpdate,
    },
    DeleteReply {
        comment_id: CommentId,
        reply_id: ReplyId,
    },
    UpdateGlobalSettings(SettingsUpdate),
    InvalidateContentPath {
        content_path: String,
        author: Author,
        date: i64,
    },
}

fn reducer(state: &State, action: &Action) -> State {
    State {
        comments: comments::reduce(&state.comments, action),
        settings: settings::reduce(&state.settings, action),
    }
}

pub type SubscriberId = u64;

/// Single-threaded store with subscribe/notify. All mutation happens
/// synchronously inside `dispatch`; async work re-enters through further
/// dispatches, so no locking is needed.
pub struct Store {
    state: RefCell<State>,
    subscribers: RefCell<Vec<(SubscriberId, Rc<dyn Fn()>)>>,
    next_subscriber: Cell<SubscriberId>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            subscribers: RefCell::new(Vec::new()),
            next_subscriber: Cell::new(1),
        }
    }

    pub fn dispatch(&self, action: Action) {
        let next = reducer(&self.state.borrow(), &action);
        *self.state.borrow_mut() = next;

        // Collect first so a subscriber may (un)subscribe or dispatch again
        // without hitting a borrow conflict.
        let subscribers: Vec<Rc<dyn Fn()>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for subscriber in subscribers {
            subscriber();
        }
    }

    /// Full state snapshot. Cheap enough at comment-thread scale; use
    /// [`Store::with_state`] to avoid the clone on hot read paths.
    pub fn snapshot(&self) -> State {
        self.state.borrow().clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn subscribe(&self, f: impl Fn() + 'static) -> SubscriberId {
        let id = self.next_subscriber.get();
        self.next_subscriber.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
    }
}
