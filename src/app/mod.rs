//! Top-level facade tying the store, the layout controller and the host
//! page together. The host integration constructs one [`CommentApp`],
//! hydrates it from the bootstrap payload and then drives it through the
//! setters and the sync operations in [`crate::state::comment_sync`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::layout::{AnchorNode, AnnotationHandle, LayoutController};
use crate::models::{
    author_id_string, lookup_author, Author, AuthorRecord, AuthorType, BootstrapData,
};
use crate::sequences::{next_comment_id, next_reply_id, CommentId};
use crate::state::{
    new_comment, new_comment_reply, Action, CommentUpdate, Mode, ReplyUpdate, SettingsUpdate,
    Store,
};
use crate::util::now_ms;

/// Bootstrap timestamps come through as RFC 3339, occasionally without an
/// offset. Unparseable values collapse to the epoch rather than failing
/// hydration.
fn parse_timestamp_ms(raw: &str) -> i64 {
    if let Ok(date) = chrono::DateTime::parse_from_rfc3339(raw) {
        return date.timestamp_millis();
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|d| d.and_utc().timestamp_millis())
        .unwrap_or(0)
}

pub struct CommentApp {
    store: Rc<Store>,
    layout: Rc<RefCell<LayoutController>>,
}

impl Default for CommentApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentApp {
    pub fn new() -> Self {
        let store = Rc::new(Store::new());
        let layout = Rc::new(RefCell::new(LayoutController::new()));

        // Mirror the pinned comment into the layout controller so the
        // packing pass always sees the store's latest choice.
        let store2 = store.clone();
        let layout2 = layout.clone();
        store.subscribe(move || {
            let pinned = store2.with_state(|s| s.comments.pinned_comment);
            layout2.borrow_mut().set_pinned_comment(pinned);
        });

        Self { store, layout }
    }

    pub fn store(&self) -> Rc<Store> {
        self.store.clone()
    }

    pub fn layout(&self) -> Rc<RefCell<LayoutController>> {
        self.layout.clone()
    }

    /// Identify the current user against the bootstrap author map. For CMS
    /// accounts this also records the numeric id API requests authenticate
    /// with; guest users keep sending their guest-identity payload instead.
    pub fn set_user(&self, user_id: &serde_json::Value, authors: &HashMap<String, AuthorRecord>) {
        let id = author_id_string(user_id);
        if id.is_empty() {
            return;
        }
        let user = lookup_author(authors, &id);
        let auth_user_id = match user.author_type {
            AuthorType::System => {
                let cms_id = if user.user_id != 0 {
                    user.user_id
                } else {
                    id.parse().unwrap_or(0)
                };
                Some(Some(cms_id))
            }
            AuthorType::External => Some(None),
        };
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                user: Some(Some(user)),
                auth_user_id,
                ..Default::default()
            }));
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                comments_enabled: Some(enabled),
                ..Default::default()
            }));
    }

    pub fn set_current_tab(&self, tab: Option<&str>) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                current_tab: Some(tab.map(str::to_string)),
                ..Default::default()
            }));
        self.layout.borrow_mut().refresh_desired_positions(tab);
    }

    pub fn set_component_style(&self, style: Option<&str>) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                component_style: Some(style.map(str::to_string)),
                ..Default::default()
            }));
    }

    pub fn set_api(&self, url: &str, key: &str, enabled: bool) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                api_url: Some(url.to_string()),
                api_key: Some(key.to_string()),
                api_enabled: Some(enabled),
                ..Default::default()
            }));
    }

    pub fn set_auth_user_id(&self, auth_user_id: Option<i64>) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                auth_user_id: Some(auth_user_id),
                ..Default::default()
            }));
    }

    pub fn set_share_context(
        &self,
        share_type: &str,
        share_url: &str,
        share_id: &str,
        guest_user: serde_json::Value,
    ) {
        self.store
            .dispatch(Action::UpdateGlobalSettings(SettingsUpdate {
                share_type: Some(share_type.to_string()),
                share_url: Some(share_url.to_string()),
                share_id: Some(share_id.to_string()),
                guest_user: Some(guest_user),
                ..Default::default()
            }));
    }

    /// Start a brand-new comment in `Creating` mode, focused and pinned so
    /// its card renders next to the selection that raised it.
    pub fn make_comment(
        &self,
        contentpath: &str,
        position: &str,
        highlighted_text: &str,
        annotation: Option<AnnotationHandle>,
    ) -> CommentId {
        let local_id = next_comment_id();
        let user = self.store.with_state(|s| s.settings.user.clone());
        self.store.dispatch(Action::AddComment(new_comment(
            contentpath,
            position,
            local_id,
            annotation,
            user,
            now_ms(),
            CommentUpdate {
                mode: Some(Mode::Creating),
                highlighted_text: Some(highlighted_text.to_string()),
                ..Default::default()
            },
        )));
        self.store.dispatch(Action::SetFocusedComment {
            local_id: Some(local_id),
            update_pinned_comment: true,
            force_focus: true,
        });
        local_id
    }

    /// Attach (or with `None`, detach) a comment's in-content marker: the
    /// handle is stored on the comment and the anchor is registered with the
    /// layout controller in the same step, so the two views never disagree.
    pub fn update_annotation(
        &self,
        local_id: CommentId,
        annotation: Option<(AnnotationHandle, Rc<dyn AnchorNode>)>,
    ) {
        let handle = annotation.as_ref().map(|(handle, _)| *handle);
        match annotation {
            Some((_, anchor)) => self
                .layout
                .borrow_mut()
                .set_comment_annotation(local_id, anchor),
            None => self.layout.borrow_mut().remove_comment_annotation(local_id),
        }
        self.store.dispatch(Action::UpdateComment {
            local_id,
            update: CommentUpdate {
                annotation: Some(handle),
                ..Default::default()
            },
        });
    }

    /// The host page removed (or re-keyed) a block of content; every comment
    /// anchored at or under the path is resolved and loses its annotation.
    pub fn invalidate_content_path(&self, content_path: &str) {
        let author = self
            .store
            .with_state(|s| s.settings.user.clone())
            .unwrap_or_else(|| Author::from_record("", &AuthorRecord::default()));
        self.store.dispatch(Action::InvalidateContentPath {
            content_path: content_path.to_string(),
            author,
            date: now_ms(),
        });
    }

    /// Replay the bootstrap payload into the store: settings first, then one
    /// comment (with its replies) per non-deleted bootstrap comment, each
    /// assigned a fresh local id.
    pub fn hydrate(&self, data: &BootstrapData) {
        let mut settings = SettingsUpdate {
            share_type: Some(data.share_type.clone()),
            share_url: Some(data.share_url.clone()),
            share_id: Some(data.share_id.clone()),
            guest_user: Some(data.guest_user.clone()),
            ..Default::default()
        };
        if let Some(user_id) = &data.user_id {
            let id = author_id_string(user_id);
            if !id.is_empty() {
                let user = lookup_author(&data.authors, &id);
                settings.auth_user_id = match user.author_type {
                    AuthorType::System => {
                        let cms_id = if user.user_id != 0 {
                            user.user_id
                        } else {
                            id.parse().unwrap_or(0)
                        };
                        Some(Some(cms_id))
                    }
                    AuthorType::External => Some(None),
                };
                settings.user = Some(Some(user));
            }
        }
        self.store.dispatch(Action::UpdateGlobalSettings(settings));

        for initial in &data.comments {
            if initial.deleted {
                continue;
            }
            let local_id = next_comment_id();
            let author = lookup_author(&data.authors, &author_id_string(&initial.user));

            let hydrated: Vec<_> = initial.replies.iter().filter(|r| !r.deleted).collect();
            let remote_reply_count = initial
                .reply_count
                .unwrap_or(hydrated.len() as u32)
                .saturating_sub(hydrated.len() as u32);

            let (resolved, resolved_date) = match &initial.resolved_at {
                Some(at) => (Some(true), Some(Some(parse_timestamp_ms(at)))),
                None => (None, None),
            };

            self.store.dispatch(Action::AddComment(new_comment(
                &initial.contentpath,
                &initial.position,
                local_id,
                None,
                Some(author),
                parse_timestamp_ms(&initial.created_at),
                CommentUpdate {
                    remote_id: Some(initial.id),
                    text: Some(initial.text.clone()),
                    highlighted_text: initial.highlighted_text.clone(),
                    remote_reply_count: Some(remote_reply_count),
                    resolved,
                    resolved_date,
                    ..Default::default()
                },
            )));

            for reply in hydrated {
                self.store.dispatch(Action::AddReply {
                    comment_id: local_id,
                    reply: new_comment_reply(
                        next_reply_id(),
                        Some(lookup_author(&data.authors, &author_id_string(&reply.user))),
                        parse_timestamp_ms(&reply.created_at),
                        ReplyUpdate {
                            remote_id: Some(reply.id),
                            text: Some(reply.text.clone()),
                            ..Default::default()
                        },
                    ),
                });
            }
        }
    }

    /// Focus (and pin) the comment with the given server id, if hydrated.
    /// Backs deep links of the form `?comment=<id>`.
    pub fn focus_comment_by_remote_id(&self, remote_id: i64) -> bool {
        let local_id = self.store.with_state(|s| {
            s.comments
                .comments
                .values()
                .find(|c| c.remote_id == Some(remote_id))
                .map(|c| c.local_id)
        });
        match local_id {
            Some(local_id) => {
                self.store.dispatch(Action::SetFocusedComment {
                    local_id: Some(local_id),
                    update_pinned_comment: true,
                    force_focus: true,
                });
                true
            }
            None => false,
        }
    }

    /// Focus the comment named in the page URL's `comment` query parameter.
    #[cfg(target_arch = "wasm32")]
    pub fn focus_from_query(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Ok(search) = window.location().search() else {
            return;
        };
        let Ok(params) = web_sys::UrlSearchParams::new_with_str(&search) else {
            return;
        };
        let Some(raw) = params.get("comment") else {
            return;
        };
        if let Ok(remote_id) = raw.parse::<i64>() {
            self.focus_comment_by_remote_id(remote_id);
        }
    }

    /// Re-read anchors for the active tab and run one packing pass. Returns
    /// true if any card moved; the caller should re-render, re-measure
    /// heights, and call again until this settles.
    pub fn refresh_layout(&self) -> bool {
        let tab = self.store.with_state(|s| s.settings.current_tab.clone());
        let mut layout = self.layout.borrow_mut();
        layout.refresh_desired_positions(tab.as_deref());
        layout.refresh_layout()
    }
}

/// [`AnchorNode`] over a live DOM element. Positions are page coordinates
/// (viewport rect plus scroll offset); the tab is read from the nearest
/// `data-tab` ancestor.
#[cfg(target_arch = "wasm32")]
pub struct DomAnchor {
    element: web_sys::Element,
}

#[cfg(target_arch = "wasm32")]
impl DomAnchor {
    pub fn new(element: web_sys::Element) -> Rc<Self> {
        Rc::new(Self { element })
    }
}

#[cfg(target_arch = "wasm32")]
impl AnchorNode for DomAnchor {
    fn top(&self) -> Option<f64> {
        if !self.element.is_connected() {
            return None;
        }
        let rect = self.element.get_bounding_client_rect();
        let scroll = web_sys::window()?.scroll_y().ok()?;
        Some(rect.top() + scroll)
    }

    fn tab(&self) -> Option<String> {
        self.element
            .closest("[data-tab]")
            .ok()
            .flatten()?
            .get_attribute("data-tab")
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InitialComment, InitialCommentReply};

    fn bootstrap() -> BootstrapData {
        serde_json::from_str(
            r#"{
                "userId": 3,
                "authors": {
                    "3": {"type": "system", "firstname": "Sam", "lastname": "Editor", "userId": 3},
                    "guest-7": {"type": "external", "firstname": "Jo", "lastname": "Bloggs"}
                },
                "shareType": "review",
                "shareUrl": "https://cms.example.com/share/xyz",
                "shareId": "xyz",
                "guestUser": {"email": "jo@example.com"},
                "comments": [
                    {
                        "id": 42,
                        "user": "guest-7",
                        "text": "needs a citation",
                        "created_at": "2021-03-11T10:22:00Z",
                        "updated_at": "2021-03-11T10:22:00Z",
                        "contentpath": "body.abc123",
                        "position": "",
                        "deleted": false,
                        "reply_count": 3,
                        "replies": [
                            {"id": 99, "user": 3, "text": "agreed", "created_at": "2021-03-12T09:00:00Z", "updated_at": "", "deleted": false}
                        ]
                    },
                    {
                        "id": 43,
                        "user": 3,
                        "text": "old thread",
                        "created_at": "2021-01-01T00:00:00Z",
                        "updated_at": "2021-01-01T00:00:00Z",
                        "contentpath": "body.def456",
                        "resolved_at": "2021-02-01T00:00:00Z"
                    },
                    {
                        "id": 44,
                        "user": 3,
                        "text": "gone",
                        "contentpath": "body.ghi789",
                        "deleted": true
                    }
                ]
            }"#,
        )
        .expect("bootstrap payload should parse")
    }

    #[test]
    fn test_hydrate_replays_the_bootstrap_payload() {
        let app = CommentApp::new();
        app.hydrate(&bootstrap());

        app.store().with_state(|s| {
            assert_eq!(s.comments.comments.len(), 2, "deleted comments are skipped");
            let first = s
                .comments
                .comments
                .values()
                .find(|c| c.remote_id == Some(42))
                .expect("comment 42 hydrated");
            assert_eq!(first.text, "needs a citation");
            assert_eq!(first.new_text, "needs a citation");
            assert_eq!(first.mode, Mode::Default);
            assert_eq!(
                first.author.as_ref().map(|a| a.firstname.as_str()),
                Some("Jo")
            );
            assert_eq!(first.replies.len(), 1);
            assert_eq!(first.remote_reply_count, 2, "3 on the server, 1 hydrated");
            let reply = first.replies.values().next().expect("reply");
            assert_eq!(reply.remote_id, Some(99));
            assert_eq!(
                reply.author.as_ref().map(|a| a.firstname.as_str()),
                Some("Sam")
            );

            let second = s
                .comments
                .comments
                .values()
                .find(|c| c.remote_id == Some(43))
                .expect("comment 43 hydrated");
            assert!(second.resolved);
            assert!(second.resolved_date.is_some());

            assert_eq!(s.settings.share_id, "xyz");
            assert_eq!(s.settings.auth_user_id, Some(3));
            assert_eq!(
                s.settings.user.as_ref().map(|u| u.firstname.as_str()),
                Some("Sam")
            );
        });
    }

    #[test]
    fn test_focus_by_remote_id_focuses_and_pins() {
        let app = CommentApp::new();
        app.hydrate(&bootstrap());

        assert!(!app.focus_comment_by_remote_id(9999));
        app.store()
            .with_state(|s| assert!(s.comments.focused_comment.is_none()));

        assert!(app.focus_comment_by_remote_id(42));
        app.store().with_state(|s| {
            let focused = s.comments.focused_comment.expect("focused");
            assert_eq!(s.comments.pinned_comment, Some(focused));
            assert!(s.comments.force_focus);
            assert_eq!(s.comments.comments[&focused].remote_id, Some(42));
        });
    }

    #[test]
    fn test_set_user_records_cms_id_only_for_system_accounts() {
        let data = bootstrap();
        let app = CommentApp::new();
        app.set_user(&serde_json::json!("guest-7"), &data.authors);
        app.store().with_state(|s| {
            assert_eq!(
                s.settings.user.as_ref().map(|u| u.author_type),
                Some(AuthorType::External)
            );
            assert_eq!(s.settings.auth_user_id, None);
        });

        app.set_user(&serde_json::json!(3), &data.authors);
        app.store()
            .with_state(|s| assert_eq!(s.settings.auth_user_id, Some(3)));
    }

    #[test]
    fn test_make_comment_starts_creating_focused_and_pinned() {
        let app = CommentApp::new();
        let local_id = app.make_comment("body.abc", "", "quoted text", None);
        app.store().with_state(|s| {
            let c = &s.comments.comments[&local_id];
            assert_eq!(c.mode, Mode::Creating);
            assert_eq!(c.highlighted_text, "quoted text");
            assert!(c.remote_id.is_none());
            assert_eq!(s.comments.focused_comment, Some(local_id));
            assert_eq!(s.comments.pinned_comment, Some(local_id));
        });
    }

    #[test]
    fn test_pinned_comment_is_mirrored_into_the_layout() {
        struct FixedAnchor(f64);
        impl AnchorNode for FixedAnchor {
            fn top(&self) -> Option<f64> {
                Some(self.0)
            }
            fn tab(&self) -> Option<String> {
                None
            }
        }

        let app = CommentApp::new();
        let a = app.make_comment("body.a", "", "", None);
        let b = app.make_comment("body.b", "", "", None);
        {
            let layout = app.layout();
            let mut layout = layout.borrow_mut();
            layout.set_comment_element(a, Some(Rc::new(FixedAnchor(100.0))));
            layout.set_comment_element(b, Some(Rc::new(FixedAnchor(100.0))));
            layout.set_comment_height(a, 40.0);
            layout.set_comment_height(b, 40.0);
        }

        // `a` was pinned first, then creating `b` re-pinned; `b` must win the
        // position tie in the packing pass.
        app.refresh_layout();
        let layout = app.layout();
        let layout = layout.borrow();
        assert_eq!(layout.get_comment_position(b), Some(100.0));
        assert_eq!(
            layout.get_comment_position(a),
            Some(100.0 + 40.0 + crate::layout::GAP)
        );
    }

    #[test]
    fn test_update_annotation_updates_store_and_layout_together() {
        struct FixedAnchor(f64);
        impl AnchorNode for FixedAnchor {
            fn top(&self) -> Option<f64> {
                Some(self.0)
            }
            fn tab(&self) -> Option<String> {
                None
            }
        }

        let app = CommentApp::new();
        let local_id = app.make_comment("body.abc", "", "", None);
        {
            let layout = app.layout();
            let mut layout = layout.borrow_mut();
            layout.set_comment_element(local_id, Some(Rc::new(FixedAnchor(300.0))));
            layout.set_comment_height(local_id, 40.0);
        }

        app.update_annotation(local_id, Some((AnnotationHandle(7), Rc::new(FixedAnchor(150.0)))));
        app.store().with_state(|s| {
            assert_eq!(
                s.comments.comments[&local_id].annotation,
                Some(AnnotationHandle(7))
            );
        });
        app.refresh_layout();
        {
            let layout = app.layout();
            let layout = layout.borrow();
            assert_eq!(layout.get_comment_position(local_id), Some(150.0));
        }

        // Detaching clears the handle and falls back to the card element.
        app.update_annotation(local_id, None);
        app.store()
            .with_state(|s| assert!(s.comments.comments[&local_id].annotation.is_none()));
        app.refresh_layout();
        let layout = app.layout();
        let layout = layout.borrow();
        assert_eq!(layout.get_comment_position(local_id), Some(300.0));
    }

    #[test]
    fn test_invalidate_content_path_without_a_user_still_resolves() {
        let app = CommentApp::new();
        let local_id = app.make_comment("body.abc.heading", "", "", None);
        app.invalidate_content_path("body.abc");
        app.store()
            .with_state(|s| assert!(s.comments.comments[&local_id].resolved));
    }

    #[test]
    fn test_timestamps_parse_with_and_without_offset() {
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01Z"), 1000);
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01"), 1000);
        assert_eq!(parse_timestamp_ms("not a date"), 0);
    }

    #[test]
    fn test_hydrate_ignores_truncated_reply_counts_below_hydrated() {
        let mut data = BootstrapData::default();
        data.comments.push(InitialComment {
            id: 1,
            user: serde_json::json!(3),
            text: "t".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            replies: vec![InitialCommentReply {
                id: 2,
                user: serde_json::json!(3),
                text: "r".to_string(),
                created_at: String::new(),
                updated_at: String::new(),
                deleted: false,
            }],
            reply_count: Some(0),
            contentpath: "body".to_string(),
            position: String::new(),
            deleted: false,
            resolved_at: None,
            highlighted_text: None,
        });

        let app = CommentApp::new();
        app.hydrate(&data);
        app.store().with_state(|s| {
            let c = s.comments.comments.values().next().expect("comment");
            assert_eq!(c.remote_reply_count, 0, "never underflows");
            assert_eq!(c.replies.len(), 1);
        });
    }
}
