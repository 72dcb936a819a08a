//! Error types for the VIM adapter
//!
//! Every public contract operation either returns a value meeting its
//! documented guarantee or fails with exactly one of the kinds below,
//! carrying a human-readable message including the offending identifier.
//! Callers never need to pattern-match message text: the variant is the
//! machine-readable kind.

use thiserror::Error;

/// Unified error type for the adapter
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Connection Errors
    // =========================================================================
    #[error("Cannot connect to VIM as {principal}: {reason}")]
    Connection {
        principal: String,
        reason: String,
        /// Optional human hint (e.g. which credential set to check).
        hint: Option<String>,
    },

    // =========================================================================
    // Resolution Errors
    // =========================================================================
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Name '{name}' is ambiguous: {count} resources match")]
    Ambiguous { name: String, count: usize },

    // =========================================================================
    // Remote Response Errors
    // =========================================================================
    #[error("Unexpected response during {operation}: {reason}")]
    UnexpectedResponse { operation: String, reason: String },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Failed to delete instance {id}: {reason}")]
    DeleteFailed { id: String, reason: String },

    // =========================================================================
    // Task Poller Errors
    // =========================================================================
    #[error("Deadline exceeded while task {task} still pending")]
    DeadlineExceeded { task: String },

    #[error("Cancelled while waiting for task {task}")]
    Cancelled { task: String },

    // =========================================================================
    // Transport / Parse Errors
    // =========================================================================
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Shorthand for a not-found error against a named resource kind.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Shorthand for an unexpected-response error during an operation.
    pub fn unexpected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnexpectedResponse {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Connection error without a hint.
    pub fn connection(principal: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Connection {
            principal: principal.into(),
            reason: reason.into(),
            hint: None,
        }
    }

    /// Optional hint for the operator, when one exists.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Connection { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is transient and worth retrying at a higher level
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Connection { .. } | Error::DeadlineExceeded { .. }
        )
    }
}

/// Result type alias for the adapter
pub type Result<T> = std::result::Result<T, Error>;
