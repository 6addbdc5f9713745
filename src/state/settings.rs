use crate::models::Author;

use super::Action;

/// Process-wide settings. Initialized once at startup and only ever updated
/// through `Action::UpdateGlobalSettings`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub user: Option<Author>,
    pub comments_enabled: bool,
    /// Which visible pane of content is active, when the editor is tabbed.
    pub current_tab: Option<String>,
    pub component_style: Option<String>,
    pub api_enabled: bool,
    pub api_url: String,
    pub api_key: String,
    /// Authenticated CMS user id, if any. Absent for guest sessions.
    pub auth_user_id: Option<i64>,
    pub share_type: String,
    pub share_url: String,
    pub share_id: String,
    /// Guest-identity payload supplied by the host page; merged verbatim
    /// into request bodies when there is no authenticated user.
    pub guest_user: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsUpdate {
    pub user: Option<Option<Author>>,
    pub comments_enabled: Option<bool>,
    pub current_tab: Option<Option<String>>,
    pub component_style: Option<Option<String>>,
    pub api_enabled: Option<bool>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub auth_user_id: Option<Option<i64>>,
    pub share_type: Option<String>,
    pub share_url: Option<String>,
    pub share_id: Option<String>,
    pub guest_user: Option<serde_json::Value>,
}

impl Settings {
    fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(user) = &update.user {
            self.user = user.clone();
        }
        if let Some(comments_enabled) = update.comments_enabled {
            self.comments_enabled = comments_enabled;
        }
        if let Some(current_tab) = &update.current_tab {
            self.current_tab = current_tab.clone();
        }
        if let Some(component_style) = &update.component_style {
            self.component_style = component_style.clone();
        }
        if let Some(api_enabled) = update.api_enabled {
            self.api_enabled = api_enabled;
        }
        if let Some(api_url) = &update.api_url {
            self.api_url = api_url.clone();
        }
        if let Some(api_key) = &update.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(auth_user_id) = update.auth_user_id {
            self.auth_user_id = auth_user_id;
        }
        if let Some(share_type) = &update.share_type {
            self.share_type = share_type.clone();
        }
        if let Some(share_url) = &update.share_url {
            self.share_url = share_url.clone();
        }
        if let Some(share_id) = &update.share_id {
            self.share_id = share_id.clone();
        }
        if let Some(guest_user) = &update.guest_user {
            self.guest_user = guest_user.clone();
        }
    }
}

pub(super) fn reduce(state: &Settings, action: &Action) -> Settings {
    match action {
        Action::UpdateGlobalSettings(update) => {
            let mut next = state.clone();
            next.apply(update);
            next
        }
        _ => state.clone(),
    }
}
