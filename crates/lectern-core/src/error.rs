//! Error types and result aliases for Lectern.
//!
//! This module defines the shared error type used across all Lectern crates.
//! Remote database failures keep the backend's machine-readable code so that
//! callers can tell transient capacity errors apart from permanent ones.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The result type used throughout Lectern.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error codes reported by the remote document database.
///
/// The string forms match the kebab-case codes the managed backend emits
/// (e.g. `resource-exhausted`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ErrorCode {
    /// The caller exceeded an allowed rate or volume of operations.
    ResourceExhausted,
    /// The addressed document or collection does not exist.
    NotFound,
    /// The caller is not allowed to perform the operation.
    PermissionDenied,
    /// The caller has no valid identity.
    Unauthenticated,
    /// The request was malformed.
    InvalidArgument,
    /// The operation was aborted, typically by a concurrency conflict.
    Aborted,
    /// The service is temporarily unreachable.
    Unavailable,
    /// The backend failed internally.
    Internal,
    /// Any code this crate does not know by name.
    Other(String),
}

impl ErrorCode {
    /// Returns the wire form of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ResourceExhausted => "resource-exhausted",
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::Aborted => "aborted",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
            Self::Other(code) => code,
        }
    }

    /// Parses a wire code, accepting an optional `firestore/` style prefix.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        let bare = code.rsplit('/').next().unwrap_or(code);
        match bare {
            "resource-exhausted" => Self::ResourceExhausted,
            "not-found" => Self::NotFound,
            "permission-denied" => Self::PermissionDenied,
            "unauthenticated" => Self::Unauthenticated,
            "invalid-argument" => Self::InvalidArgument,
            "aborted" => Self::Aborted,
            "unavailable" => Self::Unavailable,
            "internal" => Self::Internal,
            _ => Self::Other(code.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        Self::parse(&code)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

/// Errors that can occur in Lectern operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote document database rejected the operation.
    #[error("backend error ({code}): {message}")]
    Backend {
        /// Machine-readable code reported by the backend.
        code: ErrorCode,
        /// Human-readable message reported by the backend.
        message: String,
    },

    /// A local storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A key or document was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a backend error with the given code and message.
    #[must_use]
    pub fn backend(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Backend {
            code,
            message: message.into(),
        }
    }

    /// Creates the resource-exhaustion error a throttled backend reports.
    #[must_use]
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::backend(ErrorCode::ResourceExhausted, message)
    }

    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the backend code, if this error came from the remote database.
    #[must_use]
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Backend { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
