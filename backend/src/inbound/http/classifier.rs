//! Error Classifier.
//!
//! Maps any [`Error`] onto one canonical classification. Precedence:
//!
//! 1. structured validation failure → 422 Validation Error with details;
//! 2. explicit status code → category derived from the code;
//! 3. persistence driver failure → fixed message per driver failure kind;
//! 4. anything else → 500 Internal Server Error.
//!
//! The mapping is total. [`classify`] also writes exactly one structured
//! record to the `sitescope::error` target per call.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use tracing::{error, warn};

use super::envelope::{self, FailureOrigin, timestamp_now};
use crate::config::RuntimeMode;
use crate::domain::{Error, ErrorCategory, FieldIssue, PersistenceFailure, RequestId};

/// Message shown instead of raw internal failure text in production.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Mapped result of interpreting a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Canonical category.
    pub category: ErrorCategory,
    /// HTTP status to send.
    pub status: StatusCode,
    /// Client-facing message.
    pub message: String,
    /// Per-field details, if any.
    pub details: Option<Vec<FieldIssue>>,
}

impl Classification {
    fn internal(message: String) -> Self {
        Self {
            category: ErrorCategory::InternalError,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            details: None,
        }
    }
}

fn persistence_classification(kind: PersistenceFailure) -> Classification {
    let (category, status, message) = match kind {
        PersistenceFailure::KnownRequest => (
            ErrorCategory::BadRequest,
            StatusCode::BAD_REQUEST,
            "Database operation failed",
        ),
        PersistenceFailure::UnknownRequest => (
            ErrorCategory::InternalError,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database connection error",
        ),
        PersistenceFailure::SchemaMismatch => (
            ErrorCategory::InternalError,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database schema mismatch",
        ),
    };
    Classification {
        category,
        status,
        message: message.to_owned(),
        details: None,
    }
}

/// Pure mapping from a failure to its classification. Does not log.
///
/// # Examples
/// ```
/// use actix_web::http::StatusCode;
/// use sitescope_backend::config::RuntimeMode;
/// use sitescope_backend::domain::{Error, ErrorCategory};
/// use sitescope_backend::inbound::http::classifier::map_failure;
///
/// let mapped = map_failure(&Error::too_many_requests("slow down"), RuntimeMode::Production);
/// assert_eq!(mapped.category, ErrorCategory::TooManyRequests);
/// assert_eq!(mapped.status, StatusCode::TOO_MANY_REQUESTS);
/// ```
#[must_use]
pub fn map_failure(error: &Error, mode: RuntimeMode) -> Classification {
    match error {
        Error::Validation { message, issues } => Classification {
            category: ErrorCategory::ValidationError,
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.clone(),
            details: Some(issues.clone()),
        },
        Error::Status {
            status,
            message,
            details,
        } => match StatusCode::from_u16(*status) {
            Ok(code) if code.is_client_error() || code.is_server_error() => Classification {
                category: ErrorCategory::from_status(*status),
                status: code,
                message: message.clone(),
                details: details.clone(),
            },
            _ => internal(message, mode),
        },
        Error::Persistence { kind, .. } => persistence_classification(*kind),
        Error::Unexpected { message, .. } => internal(message, mode),
    }
}

/// A 500 whose raw message only surfaces outside production.
fn internal(message: &str, mode: RuntimeMode) -> Classification {
    if mode.hides_internal_errors() {
        Classification::internal(INTERNAL_ERROR_MESSAGE.to_owned())
    } else {
        Classification::internal(message.to_owned())
    }
}

/// Log the failure with its request coordinates, then map it.
pub fn classify(error: &Error, origin: FailureOrigin<'_>, mode: RuntimeMode) -> Classification {
    let classification = map_failure(error, mode);
    let current_id = RequestId::current().map(|id| id.to_string());
    let request_id = current_id.as_deref().unwrap_or("-");
    let status = classification.status.as_u16();
    let category = classification.category.label();
    let stack = error.stack();
    let timestamp = timestamp_now();

    if classification.status.is_server_error() {
        error!(
            target: "sitescope::error",
            request_id,
            method = origin.method,
            url = origin.url,
            error_message = %error,
            stack = %stack,
            timestamp = %timestamp,
            category,
            status,
            "request failed"
        );
    } else {
        warn!(
            target: "sitescope::error",
            request_id,
            method = origin.method,
            url = origin.url,
            error_message = %error,
            stack = %stack,
            timestamp = %timestamp,
            category,
            status,
            "request failed"
        );
    }
    classification
}

/// Render a classification as the error envelope.
#[must_use]
pub fn render(classification: Classification, origin: Option<FailureOrigin<'_>>) -> HttpResponse {
    let Classification {
        category,
        status,
        message,
        details,
    } = classification;
    envelope::error(category, &message, status, details, origin)
}

/// Classify a failure and render its error envelope.
#[must_use]
pub fn error_response(error: &Error, origin: FailureOrigin<'_>, mode: RuntimeMode) -> HttpResponse {
    render(classify(error, origin, mode), Some(origin))
}

/// Lift a framework error that carries no domain failure.
///
/// Client errors keep their status and message so they take the
/// explicit-status branch. Anything else becomes an internal failure.
#[must_use]
pub fn from_framework_error(err: &actix_web::Error) -> Error {
    let status = err.as_response_error().status_code();
    if status.is_client_error() {
        Error::with_status(status.as_u16(), err.to_string())
    } else {
        Error::internal(err.to_string())
    }
}
