//! Error types for consent synchronization
//!
//! Every failure collapses into `LoadState::Failed`, so the error has to be
//! cheap to clone and comparable. Sources are flattened into strings.

use crate::protocol::Operation;
use thiserror::Error;

/// Max chars of a response body kept in an `UnexpectedStatus` error.
const BODY_SNIPPET_CHARS: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("transport error ({kind}): {message}")]
    Transport {
        kind: TransportFailure,
        message: String,
    },

    #[error("{operation}: unexpected status {status}")]
    UnexpectedStatus {
        operation: Operation,
        status: u16,
        body: String,
    },

    #[error("{operation}: malformed response: {reason}")]
    MalformedResponse { operation: Operation, reason: String },
}

/// Coarse classification of transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Connect,
    Other,
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Connect => write!(f, "connect"),
            TransportFailure::Other => write!(f, "other"),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn unexpected_status(operation: Operation, status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = match text.char_indices().nth(BODY_SNIPPET_CHARS) {
            Some((idx, _)) => format!("{}…", &text[..idx]),
            None => text.into_owned(),
        };
        Self::UnexpectedStatus {
            operation,
            status,
            body,
        }
    }

    pub fn malformed(operation: Operation, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            reason: reason.into(),
        }
    }

    /// The operation that failed, when the failure happened after a response arrived.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Transport { .. } => None,
            Self::UnexpectedStatus { operation, .. }
            | Self::MalformedResponse { operation, .. } => Some(*operation),
        }
    }
}
