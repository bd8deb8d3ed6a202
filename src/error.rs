//! Typed error hierarchy for trg
//!
//! Every failure the client can observe is folded into [`ClientError`]. None
//! of these are fatal to the process: each is produced at the boundary where
//! it happens and handed back to the caller of that one operation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the remote client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-related errors (connection, timeout, non-2xx status, etc.)
    #[error("Network error: {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
        retryable: bool,
    },

    /// The daemon rejected or required HTTP authentication
    #[error("Authentication error: {message}")]
    Auth {
        kind: AuthErrorKind,
        message: String,
    },

    /// Protocol-level errors (bad response body, repeated session conflict)
    #[error("Protocol error: {message}")]
    Protocol {
        kind: ProtocolErrorKind,
        message: String,
    },

    /// The daemon answered, but `result` was not `"success"`
    #[error("Request failed: {result}")]
    Rpc { result: String },

    /// Malformed bencode
    #[error("Decoding error at offset {offset}: {message}")]
    Decode { offset: usize, message: String },

    /// Structurally valid bencode that is not a usable .torrent file
    #[error("Invalid torrent file: {0}")]
    InvalidTorrent(String),

    /// Storage/filesystem errors
    #[error("Storage error at {path:?}: {message}")]
    Storage { path: PathBuf, message: String },

    /// Invalid input from the caller
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// Operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,

    /// Client is shutting down
    #[error("Client is shutting down")]
    Shutdown,

    /// Internal error (bug)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// DNS resolution failed
    DnsResolution,
    /// Connection refused
    ConnectionRefused,
    /// Connection timeout
    Timeout,
    /// TLS/SSL error
    Tls,
    /// Server returned error status
    HttpStatus(u16),
    /// Too many redirects
    TooManyRedirects,
    /// Other network error
    Other,
}

/// Authentication error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Server requires credentials and none are configured
    Required,
    /// Configured credentials were refused
    Rejected,
}

/// Protocol error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Invalid RPC endpoint URL
    InvalidUrl,
    /// Response body was not the expected JSON document
    InvalidResponse,
    /// Server kept answering 409 after a token refresh
    SessionConflict,
    /// 409 without a usable session id header
    MissingSessionId,
}

impl ClientError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { retryable, .. } => *retryable,
            Self::Protocol { kind, .. } => matches!(kind, ProtocolErrorKind::SessionConflict),
            _ => false,
        }
    }

    /// Whether the UI should prompt for credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Create a network error
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        let retryable = matches!(
            kind,
            NetworkErrorKind::Timeout | NetworkErrorKind::ConnectionRefused
        ) || matches!(kind, NetworkErrorKind::HttpStatus(code) if code >= 500);
        Self::Network {
            kind,
            message: message.into(),
            retryable,
        }
    }

    /// Create an authentication error
    pub fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        Self::Protocol {
            kind,
            message: message.into(),
        }
    }

    /// Create a bencode decoding error
    pub fn decode(offset: usize, message: impl Into<String>) -> Self {
        Self::Decode {
            offset,
            message: message.into(),
        }
    }

    /// Create a .torrent semantic error
    pub fn invalid_torrent(message: impl Into<String>) -> Self {
        Self::InvalidTorrent(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if err.is_connect() {
            NetworkErrorKind::ConnectionRefused
        } else if err.is_redirect() {
            NetworkErrorKind::TooManyRedirects
        } else if let Some(status) = err.status() {
            NetworkErrorKind::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            return Self::protocol(ProtocolErrorKind::InvalidResponse, err.to_string());
        } else {
            NetworkErrorKind::Other
        };

        Self::network(kind, err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::protocol(ProtocolErrorKind::InvalidUrl, err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(
            ProtocolErrorKind::InvalidResponse,
            format!("JSON error: {}", err),
        )
    }
}
