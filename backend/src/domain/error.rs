//! Domain-level failure types.
//!
//! Handlers never build error responses themselves. They return one of the
//! variants below, constructed at the failure site, and the HTTP adapter
//! classifies it into exactly one error envelope.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Canonical failure category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The request is malformed.
    BadRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource or route does not exist.
    NotFound,
    /// One or more input fields failed schema validation.
    ValidationError,
    /// The client exceeded a rate limit quota.
    TooManyRequests,
    /// An unexpected failure occurred on the server.
    InternalError,
    /// An explicit status code outside the named taxonomy.
    Other,
}

impl ErrorCategory {
    /// Client-facing label written to the `error` field of the envelope.
    ///
    /// # Examples
    /// ```
    /// use sitescope_backend::domain::ErrorCategory;
    ///
    /// assert_eq!(ErrorCategory::ValidationError.label(), "Validation Error");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::ValidationError => "Validation Error",
            Self::TooManyRequests => "Too Many Requests",
            Self::InternalError => "Internal Server Error",
            Self::Other => "Error",
        }
    }

    /// Map an explicit HTTP status code onto its category.
    ///
    /// Codes without a named category map to [`ErrorCategory::Other`].
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::ValidationError,
            429 => Self::TooManyRequests,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One failed validation rule.
///
/// `field` is a dotted path prefixed by the input source, for example
/// `body.email` or `query.limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldIssue {
    /// Dotted field path including its source prefix.
    #[schema(example = "body.email")]
    pub field: String,
    /// Human-readable description of the failed rule.
    #[schema(example = "Invalid email format")]
    pub message: String,
    /// Stable machine-readable rule code.
    #[schema(example = "invalid_string")]
    pub code: String,
}

impl FieldIssue {
    /// Build an issue from its parts.
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Failure kinds raised by a persistence driver.
///
/// Only the kind survives classification; driver text never reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// The driver understood the request but rejected it.
    KnownRequest,
    /// The driver failed in a way it could not describe.
    UnknownRequest,
    /// The data did not match the persistence schema.
    SchemaMismatch,
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::KnownRequest => "known request error",
            Self::UnknownRequest => "unknown request error",
            Self::SchemaMismatch => "schema mismatch",
        };
        f.write_str(kind)
    }
}

/// Closed set of failures a request handler can raise.
///
/// # Examples
/// ```
/// use sitescope_backend::domain::Error;
///
/// let err = Error::not_found("missing");
/// assert_eq!(err.explicit_status(), Some(404));
/// assert_eq!(err.to_string(), "missing");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Aggregated schema validation failure.
    #[error("{message}")]
    Validation {
        /// Summary message.
        message: String,
        /// Every failed rule, in source order.
        issues: Vec<FieldIssue>,
    },
    /// Failure carrying an explicit HTTP status code.
    #[error("{message}")]
    Status {
        /// HTTP status code chosen at the failure site.
        status: u16,
        /// Client-facing message.
        message: String,
        /// Optional structured details passed through to the client.
        details: Option<Vec<FieldIssue>>,
    },
    /// Failure reported by a persistence driver.
    #[error("persistence failure ({kind}): {message}")]
    Persistence {
        /// Driver failure kind.
        kind: PersistenceFailure,
        /// Driver message, logged but never returned to clients.
        message: String,
    },
    /// Anything else.
    #[error("{message}")]
    Unexpected {
        /// Original failure text.
        message: String,
        /// Backtrace rendered at construction when `RUST_BACKTRACE` allows it.
        trace: String,
        /// Underlying cause, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn capture_trace() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

impl Error {
    /// Aggregated validation failure (422).
    pub fn validation(message: impl Into<String>, issues: Vec<FieldIssue>) -> Self {
        Self::Validation {
            message: message.into(),
            issues,
        }
    }

    /// Failure with an arbitrary explicit status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Convenience constructor for 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(400, message)
    }

    /// Convenience constructor for 401 Unauthorized.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(401, message)
    }

    /// Convenience constructor for 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(403, message)
    }

    /// Convenience constructor for 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(404, message)
    }

    /// Convenience constructor for 429 Too Many Requests.
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::with_status(429, message)
    }

    /// Persistence driver failure.
    pub fn persistence(kind: PersistenceFailure, message: impl Into<String>) -> Self {
        Self::Persistence {
            kind,
            message: message.into(),
        }
    }

    /// Unexpected internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
            trace: capture_trace(),
            source: None,
        }
    }

    /// Wrap an arbitrary error as an unexpected internal failure.
    pub fn internal_from<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unexpected {
            message: source.to_string(),
            trace: capture_trace(),
            source: Some(Box::new(source)),
        }
    }

    /// Attach structured details to an explicit-status failure.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_details(self, details: Vec<FieldIssue>) -> Self {
        match self {
            Self::Status {
                status, message, ..
            } => Self::Status {
                status,
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    /// Status code attached at the failure site, if any.
    #[must_use]
    pub const fn explicit_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Render the backtrace and source chain for logging.
    #[must_use]
    pub fn stack(&self) -> String {
        let mut rendered = match self {
            Self::Unexpected { trace, .. } => trace.clone(),
            _ => String::new(),
        };
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str("caused by: ");
            rendered.push_str(&err.to_string());
            cause = err.source();
        }
        rendered
    }
}
