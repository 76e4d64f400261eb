//! Top-level error types for the server client.

use thiserror::Error;

use crate::config::ConfigError;
use crate::pagination::PaginationError;
use crate::validate::{PostconditionError, PreconditionError};

/// Result alias used across the crate.
pub type ClientResult<T> = Result<T, ClientError>;

/// Top-level error type encompassing every server client failure.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A credential field failed validation before any network call.
    #[error("failing API client preconditions: {0}")]
    Precondition(#[from] PreconditionError),

    /// The token exchange succeeded but produced an inconsistent token bundle.
    #[error("server client postcondition check error: {0}")]
    Postcondition(#[from] PostconditionError),

    /// Connection, DNS, timeout or body read failure.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// A non-2xx response from the auth server.
    #[error("server error status: {status}{}", raw_body_suffix(.body))]
    Status { status: u16, body: Option<String> },

    /// A response body that is not the expected JSON.
    #[error("{context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// An authenticated request came back with a non-JSON content type.
    #[error("expected application/json Content-Type, got {actual}")]
    ContentType { actual: String },

    /// A header name or value that cannot be sent.
    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    /// Refresh or dispatch on a client that never completed `initialize`.
    #[error("the server client is not correctly initialized, use `initialize` first")]
    NotInitialized,

    /// Invalid pagination arguments.
    #[error("pagination error: {0}")]
    Pagination(#[from] PaginationError),

    /// A URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Token introspection rejected the token or answered unexpectedly.
    #[error("token introspection failed: {message}")]
    Introspection { message: String },
}

fn raw_body_suffix(body: &Option<String>) -> String {
    body.as_ref()
        .map(|b| format!("\nraw response: {}", b))
        .unwrap_or_default()
}

impl ClientError {
    /// Wrap a transport error with context.
    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Wrap a JSON decode error with context.
    pub(crate) fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// This layer never retries on its own; callers use this to decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
