//! HTTP access to the Robin API.
//!
//! [`RobinApi`] is the seam the room controller and the join flow talk to;
//! [`HttpApi`] is the reqwest-backed implementation used by the binary.
//!
//! Endpoints:
//! - `POST /api/robin/<room_id>/<action>`: room actions (`message`, `vote`).
//! - `POST /api/join_room`: enter the waiting list.
//! - `GET  /api/room_assignment.json`: poll for an assigned `roomId`.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, RequestError};
use crate::validators::Attributes;

/// Outbound operations the chat client needs from the server.
///
/// Every method resolves to the transport outcome only; application errors
/// embedded in a 2xx body are detected by callers via
/// [`api_errors_from_response`].
pub trait RobinApi: Send + Sync + 'static {
    /// POST `body` as JSON to `/api/robin/<room_id>/<action>`.
    fn post_action(
        &self,
        room_id: &str,
        action: &str,
        body: &Attributes,
    ) -> impl Future<Output = Result<Value, RequestError>> + Send;

    /// POST `/api/join_room`.
    fn join_room(&self) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// GET `/api/room_assignment.json`; `Some(room_id)` once assigned.
    fn room_assignment(&self) -> impl Future<Output = Result<Option<String>, RequestError>> + Send;
}

/// Extract the application error list from a response body.
///
/// Understands the `{"json": {"errors": [[code, message, field], ...]}}`
/// envelope as well as a bare top-level `errors` array. Returns `None` when
/// the body carries no errors.
pub fn api_errors_from_response(body: &Value) -> Option<Vec<ApiError>> {
    let errors = body
        .get("json")
        .and_then(|j| j.get("errors"))
        .or_else(|| body.get("errors"))?
        .as_array()?;

    let parsed: Vec<ApiError> = errors
        .iter()
        .map(|entry| match entry {
            Value::Array(parts) => {
                let part = |i: usize| parts.get(i).and_then(Value::as_str).map(str::to_string);
                ApiError {
                    code: part(0).unwrap_or_else(|| "UNKNOWN".to_string()),
                    message: part(1).unwrap_or_default(),
                    field: part(2),
                }
            }
            Value::String(code) => ApiError {
                code: code.clone(),
                message: String::new(),
                field: None,
            },
            other => ApiError {
                code: "UNKNOWN".to_string(),
                message: other.to_string(),
                field: None,
            },
        })
        .collect();

    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

// ---------------------------------------------------------------------------
// HttpApi
// ---------------------------------------------------------------------------

/// Configuration for [`HttpApi`].
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Base URL of the Robin site (e.g. `http://127.0.0.1:8080`).
    pub base_url: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpApiConfig {
    /// Defaults: connect 3 s, request 10 s.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// reqwest-backed [`RobinApi`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    config: HttpApiConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct AssignmentBody {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

impl HttpApi {
    pub fn builder(base_url: impl Into<String>) -> HttpApiBuilder {
        HttpApiBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn action_url(&self, room_id: &str, action: &str) -> String {
        format!("{}/api/robin/{}/{}", self.config.base_url, room_id, action)
    }

    async fn read_json(resp: reqwest::Response, url: &str) -> Result<Value, RequestError> {
        if !resp.status().is_success() {
            return Err(RequestError::Http {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| RequestError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_slice(&bytes).map_err(|e| RequestError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })
    }

    fn connect_err(url: &str, e: reqwest::Error) -> RequestError {
        RequestError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}

impl RobinApi for HttpApi {
    async fn post_action(
        &self,
        room_id: &str,
        action: &str,
        body: &Attributes,
    ) -> Result<Value, RequestError> {
        let url = self.action_url(room_id, action);
        tracing::debug!(url = %url, "posting room action");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        Self::read_json(resp, &url).await
    }

    async fn join_room(&self) -> Result<(), RequestError> {
        let url = format!("{}/api/join_room", self.config.base_url);
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        Self::read_json(resp, &url).await.map(|_| ())
    }

    async fn room_assignment(&self) -> Result<Option<String>, RequestError> {
        let url = format!("{}/api/room_assignment.json", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        let body = Self::read_json(resp, &url).await?;
        let parsed: AssignmentBody = serde_json::from_value(body).map_err(|e| RequestError::Json {
            field: "roomId".into(),
            detail: e.to_string(),
        })?;
        Ok(parsed.room_id)
    }
}

/// Builder for [`HttpApi`].
pub struct HttpApiBuilder {
    config: HttpApiConfig,
}

impl HttpApiBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: HttpApiConfig::new(base_url),
        }
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout (default 10 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> HttpApi {
        // reqwest::Client::builder() can fail in extreme environments;
        // fall back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .unwrap_or_default();

        HttpApi {
            config: self.config,
            client,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
