//! Crate-level error taxonomy.
//!
//! Three families matter to the session:
//! - [`ValidationError`]: local, raised before anything touches the network.
//! - [`RequestError`]: the transport failed (connect, non-2xx, unreadable body).
//! - [`ApiError`] lists: the server answered, but the body carries errors.
//!
//! Request and application failures are routed through the same
//! `error:<action>` channel by the room controller and get identical handling.

use serde::{Deserialize, Serialize};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RobinError>;

/// The four ways a record attribute can fail a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    InvalidOption,
    NotBoolean,
    NotString,
    LengthOutOfRange,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrorKind::InvalidOption => write!(f, "INVALID_OPTION"),
            ValidationErrorKind::NotBoolean => write!(f, "NOT_BOOLEAN"),
            ValidationErrorKind::NotString => write!(f, "NOT_STRING"),
            ValidationErrorKind::LengthOutOfRange => write!(f, "LENGTH_OUT_OF_RANGE"),
        }
    }
}

/// A single failed validation rule: which attribute, and why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} on attribute '{attr}'")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub attr: &'static str,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, attr: &'static str) -> Self {
        Self { kind, attr }
    }
}

/// Transport-level failures talking to the Robin HTTP API.
///
/// Each variant carries enough context to diagnose the failure without
/// needing to inspect the originating reqwest error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The remote server replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on field '{field}': {detail}")]
    Json { field: String, detail: String },
    /// A TCP-level connection could not be established.
    #[error("Connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
}

/// One entry of an application error payload: `[code, message, field]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} ({}): {}", self.code, field, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RobinError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    #[error("server rejected the request: {}", format_api_errors(.0))]
    Application(Vec<ApiError>),

    /// The local state machine was asked to do something its state forbids.
    /// Indicates the UI and the session have drifted apart.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// Attributes passed validation but could not be decoded into the record.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no room assignment after {attempts} attempts")]
    JoinTimeout { attempts: u32 },

    #[error("config error: {0}")]
    Config(String),

    #[error("realtime transport error: {0}")]
    Realtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_api_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RobinError {
    /// Validation failures never leave the client and are recovered locally.
    pub fn is_local(&self) -> bool {
        matches!(self, RobinError::Validation(_) | RobinError::IllegalState(_))
    }
}
