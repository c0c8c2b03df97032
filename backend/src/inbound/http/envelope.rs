//! Response Envelope Builder.
//!
//! Every API response leaves through one of the functions below so clients
//! see a single shape:
//!
//! ```text
//! success: {"success":true,"data":...,"message":"...","timestamp":"..."}
//! failure: {"error":"Not Found","message":"...","timestamp":"...","path":"/x","method":"GET"}
//! ```
//!
//! Each builder also stores the JSON it wrote as a [`ResponseSnapshot`] in the
//! response extensions. The request logging tap reads the snapshot when the
//! response completes instead of intercepting the body stream.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;
use utoipa::ToSchema;

use crate::domain::{ErrorCategory, FieldIssue};

/// Header echoing the per-request correlation identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Current time as an ISO-8601 string with millisecond precision.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Uniform top-level wrapper for success responses and plain failures.
///
/// ## Invariants
/// - `success` is true iff `error` is absent.
/// - Exactly one of `data` and `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload of a successful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Optional human-readable note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure label of an unsuccessful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO-8601 time the envelope was built.
    #[schema(example = "2025-08-12T06:51:53.012Z")]
    pub timestamp: String,
}

/// Error body contract returned for every classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Category label, for example `Validation Error`.
    #[schema(example = "Validation Error")]
    pub error: String,
    /// Client-facing message.
    #[schema(example = "Request validation failed")]
    pub message: String,
    /// ISO-8601 time the body was built.
    #[schema(example = "2025-08-12T06:51:53.012Z")]
    pub timestamp: String,
    /// Per-field failures for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
    /// Request path that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request method that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// JSON body written by one of the builders, kept for the logging tap.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSnapshot(pub Value);

/// Request coordinates echoed in error bodies.
#[derive(Debug, Clone, Copy)]
pub struct FailureOrigin<'a> {
    /// Request method.
    pub method: &'a str,
    /// Request path without the query string.
    pub path: &'a str,
    /// Request URI including the query string.
    pub url: &'a str,
}

/// Success envelope with an explicit status.
///
/// # Examples
/// ```
/// use actix_web::http::StatusCode;
/// use sitescope_backend::inbound::http::envelope::success;
///
/// let response = success(vec![1, 2, 3], Some("listed"), StatusCode::OK);
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
pub fn success<T: Serialize>(data: T, message: Option<&str>, status: StatusCode) -> HttpResponse {
    let envelope = ApiEnvelope {
        success: true,
        data: Some(data),
        message: message.map(str::to_owned),
        error: None,
        timestamp: timestamp_now(),
    };
    respond(status, &envelope)
}

/// Success envelope with `200 OK`.
pub fn ok<T: Serialize>(data: T, message: Option<&str>) -> HttpResponse {
    success(data, message, StatusCode::OK)
}

/// Success envelope with `201 Created`.
pub fn created<T: Serialize>(data: T, message: Option<&str>) -> HttpResponse {
    success(data, message, StatusCode::CREATED)
}

/// Plain failure envelope: `{success:false, message, error, timestamp}`.
///
/// Used by controllers that report a degraded state rather than a raised
/// failure, such as the health aggregate.
pub fn failure(status: StatusCode, message: &str, error: &str) -> HttpResponse {
    let envelope: ApiEnvelope<Value> = ApiEnvelope {
        success: false,
        data: None,
        message: Some(message.to_owned()),
        error: Some(error.to_owned()),
        timestamp: timestamp_now(),
    };
    respond(status, &envelope)
}

/// Error body for a classified failure.
pub fn error(
    category: ErrorCategory,
    message: &str,
    status: StatusCode,
    details: Option<Vec<FieldIssue>>,
    origin: Option<FailureOrigin<'_>>,
) -> HttpResponse {
    let body = ErrorBody {
        error: category.label().to_owned(),
        message: message.to_owned(),
        timestamp: timestamp_now(),
        details,
        path: origin.map(|origin| origin.path.to_owned()),
        method: origin.map(|origin| origin.method.to_owned()),
    };
    respond(status, &body)
}

fn respond<B: Serialize>(status: StatusCode, body: &B) -> HttpResponse {
    let value = match serde_json::to_value(body) {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "response body serialisation failed");
            return respond_value(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": ErrorCategory::InternalError.label(),
                    "message": "Internal server error",
                    "timestamp": timestamp_now(),
                }),
            );
        }
    };
    respond_value(status, value)
}

fn respond_value(status: StatusCode, value: Value) -> HttpResponse {
    let mut response = HttpResponse::build(status).json(&value);
    response.extensions_mut().insert(ResponseSnapshot(value));
    response
}
