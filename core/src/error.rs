//! Error types for the request engine.
//!
//! # Design
//! Transport failures get their own type because they are the one failure
//! that means "no response was obtained": callers key both the status field
//! and history recording off that distinction. Non-2xx responses are not
//! errors at this layer; the executor classifies them.

use std::path::PathBuf;

use thiserror::Error;

/// The request never produced an HTTP response (DNS, TLS, refused
/// connection, invalid URL, transport-level timeout).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures of the OAuth2 client-credentials token call.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no OAuth2 token URL configured")]
    MissingTokenUrl,

    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("token endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("token response is not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("token response has no access_token")]
    MissingAccessToken,
}

/// Failures reading or writing persisted request history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no data directory available on this platform; set COURIER_HISTORY_PATH")]
    NoDataDir,

    #[error("invalid history path {path:?}")]
    InvalidHistoryPath { path: PathBuf },
}
