//! Terminal error classification.
//!
//! Handlers and extractors return [`Error`](crate::domain::Error) and actix
//! keeps the failure attached to the response it renders. This middleware
//! finds that failure, classifies it once with the request method, path and
//! redacted URL, and replaces the response with the logged error envelope.
//! Framework failures that are not domain errors are lifted first.
//!
//! A failure returned as `Err` by an inner service has no request left to
//! answer with, so the envelope travels back as an [`InternalError`] holding
//! the finished response.

use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::InternalError;
use actix_web::{Error, HttpResponse};
use futures_util::future::{LocalBoxFuture, Ready, ready};

use super::{insert_request_id, redacted_url};
use crate::config::RuntimeMode;
use crate::domain::{self, RequestId};
use crate::inbound::http::classifier::{error_response, from_framework_error};
use crate::inbound::http::envelope::FailureOrigin;

/// Middleware rendering every failure as exactly one classified envelope.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use sitescope_backend::config::RuntimeMode;
/// use sitescope_backend::middleware::ErrorEnvelope;
///
/// let app = App::new().wrap(ErrorEnvelope::new(RuntimeMode::Production));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorEnvelope {
    mode: RuntimeMode,
}

impl ErrorEnvelope {
    /// Classify failures under `mode`.
    #[must_use]
    pub const fn new(mode: RuntimeMode) -> Self {
        Self { mode }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ErrorEnvelope
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ErrorEnvelopeMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ErrorEnvelopeMiddleware {
            service,
            mode: self.mode,
        }))
    }
}

/// Service wrapper produced by [`ErrorEnvelope`].
pub struct ErrorEnvelopeMiddleware<S> {
    service: S,
    mode: RuntimeMode,
}

/// Owned request coordinates, captured before the request moves inward.
struct Coordinates {
    method: String,
    path: String,
    url: String,
}

impl Coordinates {
    fn of(req: &ServiceRequest) -> Self {
        Self {
            method: req.method().as_str().to_owned(),
            path: req.path().to_owned(),
            url: redacted_url(req.path(), req.query_string()),
        }
    }

    fn classified(&self, failure: &Error, mode: RuntimeMode) -> HttpResponse {
        let origin = FailureOrigin {
            method: &self.method,
            path: &self.path,
            url: &self.url,
        };
        match failure.as_error::<domain::Error>() {
            Some(error) => error_response(error, origin, mode),
            None => error_response(&from_framework_error(failure), origin, mode),
        }
    }
}

impl<S, B> Service<ServiceRequest> for ErrorEnvelopeMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let mode = self.mode;
        let coordinates = Coordinates::of(&req);
        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    let replacement = res
                        .response()
                        .error()
                        .map(|failure| coordinates.classified(failure, mode));
                    Ok(match replacement {
                        Some(response) => res.into_response(response).map_into_right_body(),
                        None => res.map_into_left_body(),
                    })
                }
                Err(failure) => {
                    let mut response = coordinates.classified(&failure, mode);
                    if let Some(request_id) = RequestId::current() {
                        insert_request_id(response.headers_mut(), request_id);
                    }
                    Err(InternalError::from_response(failure.to_string(), response).into())
                }
            }
        })
    }
}
