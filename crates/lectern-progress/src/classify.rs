//! Quota-error classification.
//!
//! Errors reach this crate in several shapes: typed backend errors with a
//! code, loosely structured error objects decoded from JSON (for example
//! errors relayed from a browser client or a serverless function), or
//! nothing at all. [`Classify`] normalizes each of them into an
//! [`ErrorShape`], and [`ErrorShape::is_quota_exceeded`] is the single
//! decision point for "transient capacity error".

use lectern_core::{Error, ErrorCode};
use serde_json::Value;

/// Message fragment the backend uses for quota failures.
pub const QUOTA_EXCEEDED_TEXT: &str = "Quota exceeded";

/// Wire code of a resource-exhaustion failure.
pub const RESOURCE_EXHAUSTED: &str = "resource-exhausted";

/// Error name the backend's client SDK gives its errors.
pub const BACKEND_ERROR_NAME: &str = "FirebaseError";

/// The known shapes an error value can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorShape {
    /// A typed error carrying a backend code.
    Structured {
        /// Backend code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },
    /// An error-like object with any of `code`, `message`, `name`.
    Loose {
        /// Code string, if present.
        code: Option<String>,
        /// Message string, if present.
        message: Option<String>,
        /// Error name, if present.
        name: Option<String>,
    },
    /// Anything else, including null and non-objects.
    Unknown,
}

impl ErrorShape {
    /// Returns true iff the shape describes a resource-exhaustion condition.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            Self::Structured { code, message } => {
                *code == ErrorCode::ResourceExhausted || message.contains(QUOTA_EXCEEDED_TEXT)
            }
            Self::Loose {
                code,
                message,
                name,
            } => {
                let code_matches = code
                    .as_deref()
                    .is_some_and(|c| ErrorCode::parse(c) == ErrorCode::ResourceExhausted);
                let message = message.as_deref().unwrap_or_default();
                let named_backend_error = name.as_deref() == Some(BACKEND_ERROR_NAME)
                    && message.contains(RESOURCE_EXHAUSTED);

                code_matches || message.contains(QUOTA_EXCEEDED_TEXT) || named_backend_error
            }
            Self::Unknown => false,
        }
    }
}

/// Converts an error value into an [`ErrorShape`].
pub trait Classify {
    /// Returns the normalized shape of this error.
    fn shape(&self) -> ErrorShape;

    /// Returns true iff this error is a quota (resource-exhaustion) error.
    fn is_quota_exceeded(&self) -> bool {
        self.shape().is_quota_exceeded()
    }
}

impl Classify for ErrorShape {
    fn shape(&self) -> ErrorShape {
        self.clone()
    }
}

impl Classify for Error {
    fn shape(&self) -> ErrorShape {
        match self {
            Error::Backend { code, message } => ErrorShape::Structured {
                code: code.clone(),
                message: message.clone(),
            },
            other => ErrorShape::Loose {
                code: None,
                message: Some(other.to_string()),
                name: None,
            },
        }
    }
}

impl Classify for Value {
    fn shape(&self) -> ErrorShape {
        let Value::Object(fields) = self else {
            return ErrorShape::Unknown;
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        let (code, message, name) = (text("code"), text("message"), text("name"));

        if code.is_none() && message.is_none() && name.is_none() {
            ErrorShape::Unknown
        } else {
            ErrorShape::Loose {
                code,
                message,
                name,
            }
        }
    }
}

impl<T: Classify> Classify for Option<T> {
    fn shape(&self) -> ErrorShape {
        self.as_ref().map_or(ErrorShape::Unknown, Classify::shape)
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn shape(&self) -> ErrorShape {
        (**self).shape()
    }
}

/// Returns true iff `err` represents a resource-exhaustion (quota) condition.
#[must_use]
pub fn is_quota_exceeded_error<E: Classify + ?Sized>(err: &E) -> bool {
    err.is_quota_exceeded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_code_and_message() {
        assert!(is_quota_exceeded_error(&Error::quota_exceeded("slow down")));
        assert!(is_quota_exceeded_error(&Error::backend(
            ErrorCode::Unavailable,
            "Quota exceeded for quota metric 'Read requests'"
        )));
        assert!(!is_quota_exceeded_error(&Error::backend(
            ErrorCode::PermissionDenied,
            "Missing or insufficient permissions."
        )));
    }

    #[test]
    fn test_non_backend_errors_classified_by_message() {
        assert!(!is_quota_exceeded_error(&Error::NotFound("doc".into())));
        assert!(is_quota_exceeded_error(&Error::storage("Quota exceeded on local slot")));
    }

    #[test]
    fn test_loose_objects() {
        assert!(is_quota_exceeded_error(&json!({ "code": "resource-exhausted" })));
        assert!(is_quota_exceeded_error(&json!({ "code": "firestore/resource-exhausted" })));
        assert!(is_quota_exceeded_error(&json!({ "message": "Quota exceeded." })));
        assert!(is_quota_exceeded_error(&json!({
            "name": "FirebaseError",
            "message": "8 RESOURCE_EXHAUSTED: resource-exhausted"
        })));
        assert!(!is_quota_exceeded_error(&json!({ "message": "plain failure" })));
        assert!(!is_quota_exceeded_error(&json!({
            "name": "TypeError",
            "message": "resource-exhausted"
        })));
    }

    #[test]
    fn test_non_objects_are_unknown() {
        assert!(!is_quota_exceeded_error(&Value::Null));
        assert!(!is_quota_exceeded_error(&json!("Quota exceeded")));
        assert!(!is_quota_exceeded_error(&json!(42)));
        assert!(!is_quota_exceeded_error(&json!({ "status": 429 })));
        assert_eq!(json!({ "code": 8 }).shape(), ErrorShape::Unknown);
        assert!(!is_quota_exceeded_error(&None::<Error>));
        assert!(is_quota_exceeded_error(&Some(Error::quota_exceeded("x"))));
    }
}
