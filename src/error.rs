//! Custom error types for the client.
//!
//! `ObserveError` is the single error type of the library. It separates the three
//! failure families the session loop has to tell apart:
//!
//! - **Transport status errors** (`Status`): the server answered with a non-OK HTTP status.
//!   The call site decides whether this is fatal for the connection or only marks one
//!   subsystem unavailable.
//! - **Transport failures** (`Transport`, `Document`): the request never produced a usable
//!   answer (refused connection, timeout, TLS problem, undecodable body). They travel
//!   the same path as status errors.
//! - **Operator input errors** (`InvalidInput`): raised by the parsers in
//!   [`crate::protocol::input`] and shown to the operator verbatim.
//!
//! Decoding of status lines never produces an error: malformed telemetry becomes an
//! "unknown" placeholder instead.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AppResult<T> = std::result::Result<T, ObserveError>;

/// HTTP status the server uses for a temporarily unreachable subsystem.
pub const SERVICE_UNAVAILABLE: u16 = 503;

#[derive(Error, Debug)]
pub enum ObserveError {
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed document: {0}")]
    Document(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Command has no instrument target: {0}")]
    NoTarget(String),

    #[error("Command queue closed")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ObserveError {
    /// Build a status error, filling in the canonical reason phrase.
    pub fn status(code: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
            .to_string();
        ObserveError::Status { code, reason }
    }

    /// Status code carried by the error, if it is a status error.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ObserveError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for a `503 Service Unavailable` answer.
    #[must_use]
    pub fn is_service_unavailable(&self) -> bool {
        self.status_code() == Some(SERVICE_UNAVAILABLE)
    }
}

impl From<reqwest::Error> for ObserveError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ObserveError::status(status.as_u16()),
            None => ObserveError::Transport(err.to_string()),
        }
    }
}

impl From<quick_xml::DeError> for ObserveError {
    fn from(err: quick_xml::DeError) -> Self {
        ObserveError::Document(err.to_string())
    }
}
