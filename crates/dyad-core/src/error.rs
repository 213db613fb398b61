//! Shared error type across dyad crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Envelope `type` is not part of the vocabulary.
    UnknownType,
    /// Envelope payload does not match its type.
    MalformedPayload,
    /// Known type, but nothing on this side handles it.
    UnhandledType,
    /// A stream with the same session id is already running.
    StreamActive,
    /// Transport is not in the OPEN state.
    NotConnected,
    /// Settings record failed schema validation.
    InvalidSettings,
    /// Filesystem failure.
    Io,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnknownType => "UNKNOWN_TYPE",
            ClientCode::MalformedPayload => "MALFORMED_PAYLOAD",
            ClientCode::UnhandledType => "UNHANDLED_TYPE",
            ClientCode::StreamActive => "STREAM_ACTIVE",
            ClientCode::NotConnected => "NOT_CONNECTED",
            ClientCode::InvalidSettings => "INVALID_SETTINGS",
            ClientCode::Io => "IO",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// Inverse of [`ClientCode::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "BAD_REQUEST" => ClientCode::BadRequest,
            "UNKNOWN_TYPE" => ClientCode::UnknownType,
            "MALFORMED_PAYLOAD" => ClientCode::MalformedPayload,
            "UNHANDLED_TYPE" => ClientCode::UnhandledType,
            "STREAM_ACTIVE" => ClientCode::StreamActive,
            "NOT_CONNECTED" => ClientCode::NotConnected,
            "INVALID_SETTINGS" => ClientCode::InvalidSettings,
            "IO" => ClientCode::Io,
            "INTERNAL" => ClientCode::Internal,
            _ => return None,
        })
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, DyadError>;

/// Unified error type used by core, server and client.
#[derive(Debug, Error)]
pub enum DyadError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },
    #[error("unhandled message type: {0}")]
    UnhandledMessageType(&'static str),
    #[error("stream already active for session {0}")]
    StreamActive(String),
    #[error("websocket not ready (status: {0})")]
    NotConnected(&'static str),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl DyadError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            DyadError::BadRequest(_) => ClientCode::BadRequest,
            DyadError::UnknownMessageType(_) => ClientCode::UnknownType,
            DyadError::MalformedPayload { .. } => ClientCode::MalformedPayload,
            DyadError::UnhandledMessageType(_) => ClientCode::UnhandledType,
            DyadError::StreamActive(_) => ClientCode::StreamActive,
            DyadError::NotConnected(_) => ClientCode::NotConnected,
            DyadError::InvalidSettings(_) => ClientCode::InvalidSettings,
            DyadError::Io(_) => ClientCode::Io,
            DyadError::Internal(_) => ClientCode::Internal,
        }
    }
}
