// crates/session-lib/src/error.rs

//! Central error type for the session client.
use thiserror::Error;

/// Session client error types with error codes and context
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status} for {path}")]
    Api { status: u16, path: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Session channel closed")]
    ChannelClosed,

    #[error("No acknowledgement for {operation} within {timeout_secs}s")]
    AckTimeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    #[error("Location source error: {0}")]
    Location(String),

    #[error("Action {action} not allowed while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: String,
    },
}

impl SessionError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Config(_) => "CFG_001",
            SessionError::Http(_) => "HTTP_001",
            SessionError::Api { .. } => "HTTP_002",
            SessionError::Json(_) => "JSON_001",
            SessionError::Socket(_) => "SOCK_001",
            SessionError::ChannelClosed => "SOCK_002",
            SessionError::AckTimeout { .. } => "SOCK_003",
            SessionError::Location(_) => "LOC_001",
            SessionError::InvalidTransition { .. } => "STATE_001",
        }
    }

    /// Whether the failure came from a remote call rather than local state
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SessionError::Http(_)
                | SessionError::Api { .. }
                | SessionError::Socket(_)
                | SessionError::ChannelClosed
                | SessionError::AckTimeout { .. }
        )
    }
}

impl From<figment::Error> for SessionError {
    fn from(err: figment::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SessionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SessionError::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SessionError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SessionError::ChannelClosed
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
