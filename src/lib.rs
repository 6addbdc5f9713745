//! In-page commenting overlay for CMS share pages.
//!
//! Two halves, joined by [`CommentApp`]:
//!
//! * a comment/reply state machine ([`state`]) with a single [`Store`] the
//!   host integration dispatches into, synced to the remote workflow API by
//!   [`state::comment_sync`];
//! * a layout engine ([`layout`]) that assigns each visible comment card a
//!   vertical position tracking its anchor in the document without letting
//!   cards overlap.
//!
//! Compiles to WebAssembly for the browser; everything except the DOM glue
//! also builds natively, which is where the unit tests run.

pub mod app;
pub mod layout;
pub mod models;
pub mod selectors;
pub mod sequences;
pub mod state;

pub(crate) mod api;
pub(crate) mod util;

pub use app::CommentApp;
pub use layout::{AnchorNode, AnnotationHandle, LayoutController, GAP};
pub use models::{Author, AuthorType, BootstrapData};
pub use sequences::{CommentId, ReplyId};
pub use state::{Action, Comment, CommentReply, Mode, State, Store};

use wasm_bindgen::prelude::wasm_bindgen;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}
