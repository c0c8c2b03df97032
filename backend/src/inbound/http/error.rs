//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers and extractors to return it directly. The terminal
//! `ErrorEnvelope` middleware replaces the body rendered here with a logged,
//! request-aware classification; this rendering is the fallback used when no
//! middleware is mounted.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use super::classifier::{map_failure, render};
use crate::config::RuntimeMode;
use crate::domain::Error;

/// Convenient result alias for HTTP handlers.
pub use crate::domain::ApiResult;

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        map_failure(self, RuntimeMode::Production).status
    }

    fn error_response(&self) -> HttpResponse {
        // No request coordinates here; redact as production would.
        render(map_failure(self, RuntimeMode::Production), None)
    }
}
