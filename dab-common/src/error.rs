use thiserror::Error;

use crate::json::Value;

/// Errors raised by the JSON value model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonError {
    /// Parse failure with a short diagnostic.
    #[error("{0}")]
    Parse(&'static str),

    /// Read access to a missing object member or array index.
    #[error("element not found")]
    ElementNotFound,

    /// Strict read accessor used on a mismatched variant.
    #[error("invalid json {0} value")]
    InvalidValue(&'static str),

    /// `make_array`/`make_object` on an incompatible variant.
    #[error("cannot be made an {0}")]
    Incompatible(&'static str),

    /// Size query on a variant that has none.
    #[error("invalid usage")]
    InvalidUsage,

    /// Iteration over a non-object.
    #[error("json iterating over non object")]
    NotAnObject,

    /// Iteration over a non-array.
    #[error("json iterating over non array")]
    NotAnArray,
}

/// DAB protocol error. Every error that reaches a dispatch boundary is
/// shaped into a `{"status":…,"error":…}` reply; nothing propagates past
/// dispatch.
#[derive(Debug, Error)]
pub enum DabError {
    /// 400 — malformed topic, unknown deviceId, missing parameter,
    /// unsupported telemetry subject, and friends.
    #[error("{0}")]
    BadRequest(String),

    /// 500 — internal failure.
    #[error("{0}")]
    Internal(String),

    /// 501 — the device did not override this operation.
    #[error("unsupported")]
    Unsupported,

    /// JSON access or parse failure surfaced through handler plumbing.
    /// Reported on the wire as the 400 catch-all.
    #[error(transparent)]
    Json(#[from] JsonError),

    /// Configuration loading failure. Never reaches the wire.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DabError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        DabError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DabError::Internal(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        DabError::Config(message.into())
    }

    /// HTTP-style status code for the reply envelope.
    pub fn status(&self) -> i64 {
        match self {
            DabError::BadRequest(_) | DabError::Json(_) | DabError::Config(_) => 400,
            DabError::Internal(_) => 500,
            DabError::Unsupported => 501,
        }
    }

    /// Error text for the reply envelope. Unclassified failures collapse
    /// into the generic catch-all.
    pub fn wire_message(&self) -> String {
        match self {
            DabError::Json(_) | DabError::Config(_) => "unable to parse request".to_owned(),
            other => other.to_string(),
        }
    }

    /// Shape this error as a reply envelope.
    pub fn to_reply(&self) -> Value {
        Value::from_literal(vec![
            Value::pair("status", self.status()),
            Value::pair("error", self.wire_message()),
        ])
    }
}

/// Result type alias using [`DabError`].
pub type Result<T> = std::result::Result<T, DabError>;
