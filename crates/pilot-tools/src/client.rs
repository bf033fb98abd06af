use std::time::Duration;

use async_trait::async_trait;
use pilot_core::{Identity, PilotError, Result};
use serde_json::{Value, json};
use tracing::debug;

use crate::registry::{HttpMethod, RemoteRequest};

/// Issues validated requests against the project/task backend.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Perform the call on behalf of `identity` and return the response body.
    async fn invoke(&self, request: &RemoteRequest, identity: &Identity) -> Result<Value>;
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// HTTP/JSON client for the backend's agent API.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Option<String>,
    path_prefix: String,
    timeout: Option<Duration>,
}

impl HttpBackend {
    /// `base_url` may be unset; every call then fails with a configuration error.
    pub fn new(base_url: Option<String>, path_prefix: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            path_prefix: path_prefix.into(),
            timeout: None,
        }
    }

    /// Per-request timeout enforced by the HTTP client itself.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full URL for a request path.
    pub fn url_for(&self, path: &str) -> Result<String> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            PilotError::Config(
                "backend URL is not set (backend.base_url or SPRING_BACKEND_URL)".into(),
            )
        })?;
        Ok(format!("{base}{}{path}", self.path_prefix))
    }

    fn classify(&self, err: reqwest::Error, request: &RemoteRequest) -> PilotError {
        if err.is_timeout() {
            PilotError::Timeout {
                tool: request.operation.name().to_string(),
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }
        } else if err.is_connect() {
            PilotError::Transport(format!(
                "cannot connect to backend at {}",
                self.base_url.as_deref().unwrap_or_default()
            ))
        } else {
            PilotError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RemoteClient for HttpBackend {
    async fn invoke(&self, request: &RemoteRequest, identity: &Identity) -> Result<Value> {
        let url = self.url_for(&request.path)?;
        debug!(
            tool = request.operation.name(),
            method = %request.method,
            path = %request.path,
            subject = identity.subject_id,
            "calling backend"
        );

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .bearer_auth(identity.credential.expose())
            .header("X-User-ID", identity.subject_id.to_string());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| self.classify(e, request))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.classify(e, request))?;

        if !status.is_success() {
            return Err(PilotError::Backend {
                status: status.as_u16(),
                detail: error_detail(&bytes),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(json!({ "message": "Success", "status_code": status.as_u16() }));
        }

        Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())))
    }
}

/// Pull a readable error out of a failure body.
fn error_detail(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "empty response body".into()
    } else {
        text
    }
}
