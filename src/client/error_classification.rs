//! Error classification logic

use std::io::ErrorKind;

use crate::transport::TransportError;
use crate::types::outcome::ErrorOutcome;
use crate::Error;

/// Map a failure to the user-facing taxonomy.
///
/// Priority: cancellation, timeout, HTTP status class, connectivity, everything else.
/// Pure; the caller is responsible for logging.
pub fn classify(error: &Error) -> ErrorOutcome {
    if matches!(error, Error::Cancelled) {
        return ErrorOutcome::Cancelled;
    }
    if is_timeout(error) {
        return ErrorOutcome::Timeout;
    }
    if let Some(status) = status_of(error) {
        match status {
            400..=499 => return ErrorOutcome::ClientError { status },
            500..=599 => return ErrorOutcome::ServerError { status },
            _ => {}
        }
    }
    if is_connectivity(error) {
        return ErrorOutcome::NetworkError;
    }
    ErrorOutcome::Unexpected {
        message: unexpected_message(error),
    }
}

fn is_timeout(error: &Error) -> bool {
    match error {
        Error::Timeout { .. } => true,
        Error::Transport(TransportError::Timeout) => true,
        Error::Transport(TransportError::Http(e)) => e.is_timeout(),
        Error::Io(e) => e.kind() == ErrorKind::TimedOut,
        _ => false,
    }
}

fn status_of(error: &Error) -> Option<u16> {
    match error {
        Error::Remote { status, .. } => Some(*status),
        Error::Transport(TransportError::Http(e)) => e.status().map(|s| s.as_u16()),
        _ => None,
    }
}

fn is_connectivity(error: &Error) -> bool {
    match error {
        // A body that arrived but cannot be decoded is not a connectivity problem.
        Error::Transport(TransportError::Http(e)) => !e.is_decode() && e.status().is_none(),
        Error::Transport(TransportError::Other(_)) => true,
        Error::Io(e) => matches!(
            e.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
                | ErrorKind::AddrNotAvailable
        ),
        _ => false,
    }
}

fn unexpected_message(error: &Error) -> String {
    match error {
        Error::Runtime { message, .. }
        | Error::Validation { message, .. }
        | Error::Configuration { message, .. }
        | Error::Unknown { message, .. } => message.clone(),
        Error::Serialization(e) => format!("malformed response: {}", e),
        Error::Remote { status, message } => format!("HTTP {}: {}", status, message),
        other => other.to_string(),
    }
}
