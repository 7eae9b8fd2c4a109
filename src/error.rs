//! Error types for scroll sessions.
//!
//! Every session operation returns [`Result<T>`]. The variants keep the three
//! failure classes of a request apart:
//!
//! - [`TransportError`] - the backend could not be reached or timed out
//! - [`BackendError`] - the backend answered and rejected the request
//! - [`DecodeError`] - the backend answered 2xx with an unexpected shape

use serde_json::Value;
use thiserror::Error;

/// The main error type for scroll sessions.
#[derive(Debug, Error)]
pub enum ScrollError {
    #[error("Cannot create scroll session: {message}")]
    Construction { message: String },

    #[error("Scroll is not initialized, call init() first")]
    NotInitialized,

    #[error("Scroll is not started, call start() first")]
    NotStarted,

    #[error("Invalid scroll query: {message}")]
    InvalidQuery { message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The page arrived but some shards failed or the search timed out, so
    /// its hits can't be trusted.
    #[error("Partial scroll results (timed_out={timed_out}, failed_shards={failed_shards})")]
    PartialResults { timed_out: bool, failed_shards: u64 },
}

impl ScrollError {
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ScrollError::Transport(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, ScrollError::Backend(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ScrollError::Decode(_))
    }
}

/// What went wrong below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Request,
    Body,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
        };
        f.write_str(value)
    }
}

/// The HTTP call could not be completed.
#[derive(Debug, Error)]
#[error("Transport {kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        TransportError::new(kind, err.to_string()).with_source(err)
    }
}

/// The backend answered and reported a failure.
///
/// `body` is the response text exactly as received.
#[derive(Debug, Error)]
#[error("Backend returned HTTP {status}: {}", summary(.error_type, .reason, .body))]
pub struct BackendError {
    pub status: u16,
    pub error_type: Option<String>,
    pub reason: Option<String>,
    pub body: String,
}

fn summary(error_type: &Option<String>, reason: &Option<String>, body: &str) -> String {
    match (error_type, reason) {
        (Some(error_type), Some(reason)) => format!("{error_type}: {reason}"),
        (None, Some(reason)) => reason.clone(),
        (Some(error_type), None) => error_type.clone(),
        (None, None) => body.to_string(),
    }
}

impl BackendError {
    /// Build from a raw response, picking `type` and `reason` out of the
    /// usual `{"error": {...}}` or `{"error": "..."}` bodies.
    pub fn from_response(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let (error_type, reason) = match serde_json::from_str::<Value>(&body) {
            Ok(value) => parse_error_member(&value),
            Err(_) => (None, None),
        };
        Self {
            status,
            error_type,
            reason,
            body,
        }
    }
}

fn parse_error_member(value: &Value) -> (Option<String>, Option<String>) {
    match value.get("error") {
        Some(Value::Object(err)) => (
            err.get("type").and_then(Value::as_str).map(str::to_string),
            err.get("reason").and_then(Value::as_str).map(str::to_string),
        ),
        Some(Value::String(reason)) => (None, Some(reason.clone())),
        _ => (None, None),
    }
}

/// A 2xx response that doesn't look like a scroll response.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Response is not a JSON object")]
    NotAnObject,

    #[error("Response is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Response field '{field}' is invalid: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Result type alias for scroll operations
pub type Result<T> = std::result::Result<T, ScrollError>;
