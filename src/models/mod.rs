use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity classification carried on every author record.
///
/// The share backend labels editors invited by link as `external`; CMS
/// accounts come through as `system` (historically also seen as `wagtail`).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthorType {
    External,
    #[serde(alias = "wagtail")]
    System,
}

/// Immutable author value object. Identity is `author_type` + the
/// type-appropriate id, see [`is_author_current_user`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Author {
    pub id: String,
    #[serde(rename = "type")]
    pub author_type: AuthorType,
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "jobTitle", default)]
    pub job_title: String,
    #[serde(default)]
    pub organisation: String,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
}

/// Author record as supplied by the host page's bootstrap author map,
/// keyed externally by user id.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AuthorRecord {
    #[serde(rename = "type", default)]
    pub author_type: Option<AuthorType>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(rename = "jobTitle", default)]
    pub job_title: String,
    #[serde(default)]
    pub organisation: String,
    #[serde(rename = "userId", default)]
    pub user_id: i64,
}

impl Author {
    pub fn from_record(id: &str, record: &AuthorRecord) -> Self {
        Self {
            id: id.to_string(),
            author_type: record.author_type.unwrap_or(AuthorType::System),
            firstname: record.firstname.clone(),
            lastname: record.lastname.clone(),
            job_title: record.job_title.clone(),
            organisation: record.organisation.clone(),
            user_id: record.user_id,
        }
    }
}

/// Resolve an author id against the bootstrap author map. Unknown ids still
/// produce a usable (blank) author so hydration never fails.
pub fn lookup_author(authors: &HashMap<String, AuthorRecord>, id: &str) -> Author {
    match authors.get(id) {
        Some(record) => Author::from_record(id, record),
        None => Author::from_record(id, &AuthorRecord::default()),
    }
}

/// The one canonical author-identity comparison: match by type, then by the
/// id namespace that type uses. A comment with no author is treated as the
/// current user's own (it was created locally before identity was known).
pub fn is_author_current_user(author: Option<&Author>, user: Option<&Author>) -> bool {
    let Some(author) = author else {
        return true;
    };
    let Some(user) = user else {
        return false;
    };
    match user.author_type {
        AuthorType::External => author.id == user.id,
        AuthorType::System => author.user_id == user.user_id,
    }
}

// Bootstrap payloads are serialized pretty directly from the backend's
// comment models; field names follow that wire contract.

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InitialCommentReply {
    pub id: i64,
    pub user: serde_json::Value,
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InitialComment {
    pub id: i64,
    pub user: serde_json::Value,
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub replies: Vec<InitialCommentReply>,
    /// Total reply count on the server; may exceed `replies.len()` when the
    /// bootstrap payload is truncated.
    #[serde(default)]
    pub reply_count: Option<u32>,
    pub contentpath: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub highlighted_text: Option<String>,
}

/// Everything the host page hands over at startup.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BootstrapData {
    #[serde(rename = "userId", default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub authors: HashMap<String, AuthorRecord>,
    #[serde(default)]
    pub comments: Vec<InitialComment>,
    #[serde(rename = "shareType", default)]
    pub share_type: String,
    #[serde(rename = "shareUrl", default)]
    pub share_url: String,
    #[serde(rename = "shareId", default)]
    pub share_id: String,
    /// Guest-identity payload used on API requests when no authenticated
    /// user exists. Kept opaque; request bodies merge its fields verbatim.
    #[serde(rename = "guestUser", default)]
    pub guest_user: serde_json::Value,
}

/// Bootstrap ids come through as either numbers or strings depending on the
/// backend serializer; normalize to the string form the author map is keyed by.
pub(crate) fn author_id_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external(id: &str) -> Author {
        Author {
            id: id.to_string(),
            author_type: AuthorType::External,
            firstname: "Jo".to_string(),
            lastname: "Bloggs".to_string(),
            job_title: String::new(),
            organisation: String::new(),
            user_id: 0,
        }
    }

    fn system(user_id: i64) -> Author {
        Author {
            id: user_id.to_string(),
            author_type: AuthorType::System,
            firstname: "Sam".to_string(),
            lastname: "Editor".to_string(),
            job_title: String::new(),
            organisation: String::new(),
            user_id,
        }
    }

    #[test]
    fn test_author_identity_matches_by_type_then_id() {
        let a = external("guest-7");
        let u = external("guest-7");
        assert!(is_author_current_user(Some(&a), Some(&u)));

        let other = external("guest-8");
        assert!(!is_author_current_user(Some(&a), Some(&other)));

        // Same id string but different namespace must not match.
        let sys = system(7);
        let ext = external("7");
        assert!(!is_author_current_user(Some(&ext), Some(&sys)));
        assert!(is_author_current_user(Some(&system(7)), Some(&sys)));
    }

    #[test]
    fn test_missing_author_belongs_to_anyone_missing_user_to_no_one() {
        let u = external("1");
        assert!(is_author_current_user(None, Some(&u)));
        assert!(!is_author_current_user(Some(&u), None));
    }

    #[test]
    fn test_initial_comment_contract_deserialize() {
        // Contract mirrors the backend comment serializer.
        let json = r#"{
            "id": 42,
            "user": 3,
            "text": "needs a citation",
            "created_at": "2021-03-11T10:22:00Z",
            "updated_at": "2021-03-11T10:22:00Z",
            "replies": [
                {"id": 99, "user": 4, "text": "agreed", "created_at": "", "updated_at": "", "deleted": false}
            ],
            "contentpath": "body.abc123",
            "position": "",
            "deleted": false,
            "resolved_at": null
        }"#;
        let parsed: InitialComment = serde_json::from_str(json).expect("bootstrap comment should parse");
        assert_eq!(parsed.id, 42);
        assert_eq!(parsed.replies.len(), 1);
        assert!(parsed.resolved_at.is_none());
        assert_eq!(author_id_string(&parsed.user), "3");
    }

    #[test]
    fn test_author_type_accepts_legacy_wagtail_label() {
        let a: AuthorType = serde_json::from_str("\"wagtail\"").expect("should parse");
        assert_eq!(a, AuthorType::System);
        assert_eq!(a.to_string(), "system");
    }
}
