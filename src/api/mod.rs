use reqwest::Method;
use serde_json::{json, Value};

use crate::state::Settings;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Network,
    Http,
    /// HTTP 200 whose decoded body signals `success: "False"`.
    Api,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn http(status: u16, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status})"),
        }
    }

    pub(crate) fn api(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Api,
            message: message.into(),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Fields the create-comment endpoint needs beyond the requester identity.
#[derive(Clone, Debug)]
pub(crate) struct NewCommentRequest {
    pub new_text: String,
    pub contentpath: String,
    pub position: String,
    pub highlighted_text: String,
}

/// Thin client for the workflow comment API. One instance is snapshotted
/// from settings per operation, so late settings changes never tear an
/// in-flight request.
#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    base_url: String,
    api_key: String,
    auth_user_id: Option<i64>,
    guest_user: Value,
    share_id: String,
}

impl ApiClient {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            auth_user_id: settings.auth_user_id,
            guest_user: settings.guest_user.clone(),
            share_id: settings.share_id.clone(),
        }
    }

    /// Requester identity carried on every request: the authenticated CMS
    /// user id when present, otherwise the guest-identity fields verbatim.
    fn identity_body(&self) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        if let Some(user_id) = self.auth_user_id {
            body.insert("wagtail_user_id".to_string(), json!(user_id));
        } else if let Value::Object(guest) = &self.guest_user {
            for (k, v) in guest {
                body.insert(k.clone(), v.clone());
            }
        }
        body
    }

    fn text_body(&self, new_text: &str) -> Value {
        let mut body = self.identity_body();
        body.insert("newText".to_string(), json!(new_text));
        Value::Object(body)
    }

    fn create_comment_body(&self, request: &NewCommentRequest) -> Value {
        let mut body = self.identity_body();
        body.insert("newText".to_string(), json!(request.new_text));
        body.insert("contentPath".to_string(), json!(request.contentpath));
        body.insert("position".to_string(), json!(request.position));
        body.insert(
            "highlightedText".to_string(),
            json!(request.highlighted_text),
        );
        body.insert("shareId".to_string(), json!(self.share_id));
        Value::Object(body)
    }

    fn entity_url(&self, asset: &str, remote_id: i64, action: &str) -> String {
        format!(
            "{}/workflow-api/{}/{}/{}/",
            self.base_url, asset, remote_id, action
        )
    }

    /// Wire contract: any non-200 status is a failure, and a 200 whose JSON
    /// body carries `success: "False"` (a string, imposed by the backend)
    /// is an application-level failure surfacing the `error` field.
    fn decode(status: u16, body: &str, ctx: &str) -> ApiResult<Value> {
        if status != 200 {
            return Err(ApiError::http(status, ctx));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(body).map_err(ApiError::parse)?;
        if value.get("success").and_then(|v| v.as_str()) == Some("False") {
            let error = value
                .get("error")
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| format!("{ctx} failed"));
            return Err(ApiError::api(error));
        }
        Ok(value)
    }

    async fn send(&self, method: Method, url: String, body: Option<Value>) -> ApiResult<Value> {
        let ctx = format!("{method} {url}");
        let client = reqwest::Client::new();
        let mut req = client
            .request(method, &url)
            .header("Subscription-Key", &self.api_key);
        if let Some(body) = &body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(ApiError::network)?;
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        Self::decode(status, &text, &ctx)
    }

    /// Create a comment; returns the server-assigned remote id.
    pub async fn create_comment(&self, request: &NewCommentRequest) -> ApiResult<i64> {
        let body = self.create_comment_body(request);
        let url = format!("{}/workflow-api/comment/add/", self.base_url);
        let value = self.send(Method::POST, url, Some(body)).await?;
        value
            .get("commentId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ApiError::parse("create response is missing commentId"))
    }

    pub async fn update_comment(&self, remote_id: i64, new_text: &str) -> ApiResult<()> {
        let url = self.entity_url("comment", remote_id, "update");
        self.send(Method::PUT, url, Some(self.text_body(new_text)))
            .await?;
        Ok(())
    }

    pub async fn delete_comment(&self, remote_id: i64) -> ApiResult<()> {
        let url = self.entity_url("comment", remote_id, "delete");
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    pub async fn resolve_comment(&self, remote_id: i64) -> ApiResult<()> {
        let url = self.entity_url("comment", remote_id, "resolve");
        self.send(Method::PUT, url, None).await?;
        Ok(())
    }

    pub async fn reopen_comment(&self, remote_id: i64) -> ApiResult<()> {
        let url = self.entity_url("comment", remote_id, "reopen");
        self.send(Method::PUT, url, None).await?;
        Ok(())
    }

    /// Create a reply under a saved comment; returns the reply's remote id.
    pub async fn add_reply(&self, comment_remote_id: i64, new_text: &str) -> ApiResult<i64> {
        let url = self.entity_url("reply", comment_remote_id, "add_reply");
        let value = self
            .send(Method::POST, url, Some(self.text_body(new_text)))
            .await?;
        value
            .get("replyId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ApiError::parse("add_reply response is missing replyId"))
    }

    pub async fn update_reply(&self, remote_id: i64, new_text: &str) -> ApiResult<()> {
        let url = self.entity_url("reply", remote_id, "update");
        self.send(Method::PUT, url, Some(self.text_body(new_text)))
            .await?;
        Ok(())
    }

    pub async fn delete_reply(&self, remote_id: i64) -> ApiResult<()> {
        let url = self.entity_url("reply", remote_id, "delete");
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}
