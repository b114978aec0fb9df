//! User-facing failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified failure of an exchange.
///
/// This is all the conversation layer ever sees of a failure: a stable tag plus a
/// rendered message, never the underlying error chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorOutcome {
    Timeout,
    ClientError { status: u16 },
    ServerError { status: u16 },
    NetworkError,
    Cancelled,
    Unexpected { message: String },
}

impl ErrorOutcome {
    /// Stable taxonomy tag, suitable for logs and metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorOutcome::Timeout => "timeout",
            ErrorOutcome::ClientError { .. } => "client_error",
            ErrorOutcome::ServerError { .. } => "server_error",
            ErrorOutcome::NetworkError => "network_error",
            ErrorOutcome::Cancelled => "cancelled",
            ErrorOutcome::Unexpected { .. } => "unexpected",
        }
    }

    /// Human-readable description shown in the conversation.
    pub fn message(&self) -> String {
        match self {
            ErrorOutcome::Timeout => "The request timed out.".to_string(),
            ErrorOutcome::ClientError { status } => match status {
                401 | 403 => format!(
                    "The server rejected the request (HTTP {}). Check your API key.",
                    status
                ),
                404 => "The model or endpoint was not found (HTTP 404).".to_string(),
                429 => "Rate limit reached (HTTP 429). Try again later.".to_string(),
                _ => format!("The server rejected the request (HTTP {}).", status),
            },
            ErrorOutcome::ServerError { status } => {
                format!("The server failed to answer (HTTP {}).", status)
            }
            ErrorOutcome::NetworkError => "Could not reach the server.".to_string(),
            ErrorOutcome::Cancelled => "Request cancelled.".to_string(),
            ErrorOutcome::Unexpected { message } => format!("Unexpected error: {}", message),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ErrorOutcome::ClientError { status } | ErrorOutcome::ServerError { status } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ErrorOutcome::Cancelled)
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
