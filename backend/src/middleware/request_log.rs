//! Request Logging Tap.
//!
//! Each incoming request receives a UUID request identifier, stored in
//! task-local storage via [`RequestId::scope`], in the request extensions as
//! part of a [`RequestContext`], and echoed in the `X-Request-ID` response
//! header.
//!
//! The tap logs an "incoming request" record on entry and exactly one
//! "request completed" record per request. Completion is driven by the
//! response coming back through the middleware, which carries the JSON body
//! the envelope builder recorded as a [`ResponseSnapshot`]. A request whose
//! future is dropped before a response exists (the client went away) is
//! completed from `Drop` with status 499.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`RequestId::scope`] when spawning new tasks so the identifier propagates.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::{BodySize, EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::http::header::{self, HeaderMap, HeaderName};
use actix_web::{Error, HttpMessage, web};
use chrono::Utc;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::{Map, Value};
use tracing::Level;

use super::{client_ip, insert_request_id, redacted_url};
use crate::config::RuntimeMode;
use crate::domain::{RequestContext, RequestId};
use crate::inbound::http::classifier::{error_response, from_framework_error};
use crate::inbound::http::envelope::{FailureOrigin, ResponseSnapshot};

const LOG_TARGET: &str = "sitescope::http";

/// Marker replacing the value of a sensitive field.
pub const REDACTED: &str = "[REDACTED]";

/// Top-level field names whose values never reach the logs.
pub const SENSITIVE_FIELDS: [&str; 6] = [
    "password",
    "token",
    "secret",
    "key",
    "auth",
    "authorization",
];

/// Elapsed time above which a successful request is logged as slow.
pub const SLOW_REQUEST_MS: u64 = 5_000;

/// Status recorded when the client abandons a request before a response.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Whether a field or query parameter name is sensitive, ignoring case.
pub(crate) fn is_sensitive(name: &str) -> bool {
    SENSITIVE_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(name))
}

/// Replace sensitive top-level fields of an object with [`REDACTED`].
///
/// Matching is case-insensitive. Nested objects and non-object values are
/// returned unchanged.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use sitescope_backend::middleware::request_log::sanitize;
///
/// let clean = sanitize(&json!({"Password": "hunter2", "user": {"token": "t"}}));
/// assert_eq!(clean, json!({"Password": "[REDACTED]", "user": {"token": "t"}}));
/// ```
#[must_use]
pub fn sanitize(data: &Value) -> Value {
    let Value::Object(fields) = data else {
        return data.clone();
    };
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| {
                let logged = if is_sensitive(name) {
                    Value::String(REDACTED.to_owned())
                } else {
                    value.clone()
                };
                (name.clone(), logged)
            })
            .collect(),
    )
}

/// Severity bucket of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Status 500 and above.
    ServerError,
    /// Status 400 to 499.
    ClientError,
    /// Below 400 but slower than the threshold.
    Slow,
    /// Everything else.
    Success,
}

impl Completion {
    /// Bucket a response by status and elapsed time.
    #[must_use]
    pub const fn of(status: u16, elapsed_ms: u64, slow_threshold_ms: u64) -> Self {
        if status >= 500 {
            Self::ServerError
        } else if status >= 400 {
            Self::ClientError
        } else if elapsed_ms > slow_threshold_ms {
            Self::Slow
        } else {
            Self::Success
        }
    }

    /// Log level of the completion record.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::ServerError => Level::ERROR,
            Self::ClientError | Self::Slow => Level::WARN,
            Self::Success => Level::INFO,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::ServerError => "request completed with server error",
            Self::ClientError => "request completed with client error",
            Self::Slow => "slow request detected",
            Self::Success => "request completed successfully",
        }
    }
}

/// Tap configuration.
#[derive(Debug, Clone)]
pub struct TapSettings {
    /// Log response bodies of successful requests too.
    pub log_bodies: bool,
    /// Paths that receive a request ID but no log records.
    pub skip_paths: Vec<String>,
    /// Slow-request threshold in milliseconds.
    pub slow_threshold_ms: u64,
    /// Mode used to classify body-read failures at the tap.
    pub mode: RuntimeMode,
}

impl Default for TapSettings {
    fn default() -> Self {
        Self {
            log_bodies: false,
            skip_paths: vec!["/health".to_owned()],
            slow_threshold_ms: SLOW_REQUEST_MS,
            mode: RuntimeMode::default(),
        }
    }
}

impl TapSettings {
    fn skips(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|skipped| skipped == path)
    }
}

/// Per-request logging state with a one-shot completion.
#[derive(Debug)]
pub struct RequestTap {
    context: RequestContext,
    method: String,
    url: String,
    log_bodies: bool,
    slow_threshold_ms: u64,
    completed: bool,
}

impl RequestTap {
    /// Open a tap for one request.
    ///
    /// `url` is logged as given; pass it through [`redacted_url`] first.
    #[must_use]
    pub fn new(context: RequestContext, method: &str, url: &str, settings: &TapSettings) -> Self {
        Self {
            context,
            method: method.to_owned(),
            url: url.to_owned(),
            log_bodies: settings.log_bodies,
            slow_threshold_ms: settings.slow_threshold_ms,
            completed: false,
        }
    }

    /// Whether the completion record has been written.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    fn log_incoming(&self, headers: &HeaderMap, query: &Value, body: Option<&Value>) {
        let header_text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let user_agent = header_text(header::USER_AGENT).unwrap_or_else(|| "unknown".to_owned());
        let content_type = header_text(header::CONTENT_TYPE);
        let accept = header_text(header::ACCEPT);
        let origin = header_text(header::ORIGIN);
        let referer = header_text(header::REFERER);
        let query_text = sanitize(query).to_string();
        let body_text = body.map(|value| sanitize(value).to_string());
        tracing::info!(
            target: LOG_TARGET,
            request_id = %self.context.request_id,
            method = %self.method,
            url = %self.url,
            client_ip = %self.context.client_ip,
            user_agent = %user_agent,
            query = %query_text,
            body = body_text.as_deref(),
            content_type = content_type.as_deref(),
            accept = accept.as_deref(),
            origin = origin.as_deref(),
            referer = referer.as_deref(),
            "incoming request"
        );
    }

    /// Write the completion record unless one was already written.
    ///
    /// Returns `true` only for the call that wrote the record.
    pub fn complete(
        &mut self,
        status: u16,
        body: Option<&Value>,
        content_length: Option<u64>,
    ) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;

        let elapsed_ms = u64::try_from(self.context.elapsed_ms()).unwrap_or(u64::MAX);
        let completion = Completion::of(status, elapsed_ms, self.slow_threshold_ms);
        let response_body = if status >= 400 || self.log_bodies {
            body.map(|value| sanitize(value).to_string())
        } else {
            None
        };
        let request_id = self.context.request_id;
        let client_ip = self.context.client_ip.as_str();
        let method = self.method.as_str();
        let url = self.url.as_str();
        let message = completion.message();

        macro_rules! completion_event {
            ($level:expr) => {
                tracing::event!(
                    target: LOG_TARGET,
                    $level,
                    request_id = %request_id,
                    method,
                    url,
                    client_ip,
                    status,
                    duration_ms = elapsed_ms,
                    content_length,
                    response_body = response_body.as_deref(),
                    "{message}"
                )
            };
        }
        match completion {
            Completion::ServerError => completion_event!(Level::ERROR),
            Completion::ClientError | Completion::Slow => completion_event!(Level::WARN),
            Completion::Success => completion_event!(Level::INFO),
        }
        true
    }
}

impl Drop for RequestTap {
    fn drop(&mut self) {
        self.complete(CLIENT_CLOSED_REQUEST, None, None);
    }
}

/// Logging middleware attaching a request ID and logging each request once
/// on entry and once on completion.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use sitescope_backend::middleware::RequestLogging;
///
/// let app = App::new().wrap(RequestLogging::default());
/// ```
#[derive(Clone, Default)]
pub struct RequestLogging {
    settings: Arc<TapSettings>,
}

impl RequestLogging {
    /// Middleware with explicit settings.
    #[must_use]
    pub fn new(settings: TapSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware {
            service: Rc::new(service),
            settings: Arc::clone(&self.settings),
        }))
    }
}

/// Service wrapper produced by [`RequestLogging`].
pub struct RequestLoggingMiddleware<S> {
    service: Rc<S>,
    settings: Arc<TapSettings>,
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Read the whole payload, then hand an identical payload back to the request.
async fn buffer_body(req: &mut ServiceRequest) -> Result<web::Bytes, Error> {
    let bytes = req.extract::<web::Bytes>().await?;
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(bytes.clone());
    req.set_payload(payload.into());
    Ok(bytes)
}

fn query_value(query_string: &str) -> Value {
    web::Query::<HashMap<String, String>>::from_query(query_string).map_or_else(
        |_| Value::String(query_string.to_owned()),
        |query| {
            Value::Object(
                query
                    .into_inner()
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect::<Map<_, _>>(),
            )
        },
    )
}

fn content_length(size: BodySize) -> Option<u64> {
    match size {
        BodySize::Sized(length) => Some(length),
        BodySize::None => Some(0),
        BodySize::Stream => None,
    }
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
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

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let settings = Arc::clone(&self.settings);
        let context = RequestContext::start(Utc::now(), client_ip(&req));
        let request_id = context.request_id;
        req.extensions_mut().insert(context.clone());

        Box::pin(RequestId::scope(request_id, async move {
            let mut tap = None;
            if !settings.skips(req.path()) {
                let method = req.method().clone();
                let url = redacted_url(req.path(), req.query_string());
                let mut opened = RequestTap::new(context, method.as_str(), &url, &settings);

                let body = if carries_body(&method) {
                    match buffer_body(&mut req).await {
                        Ok(bytes) => serde_json::from_slice::<Value>(&bytes).ok(),
                        Err(err) => {
                            let query = query_value(req.query_string());
                            opened.log_incoming(req.headers(), &query, None);
                            let origin = FailureOrigin {
                                method: method.as_str(),
                                path: req.path(),
                                url: &url,
                            };
                            let response =
                                error_response(&from_framework_error(&err), origin, settings.mode);
                            let mut rejected = req.into_response(response);
                            insert_request_id(rejected.headers_mut(), request_id);
                            let snapshot =
                                rejected.response().extensions().get::<ResponseSnapshot>().cloned();
                            opened.complete(
                                rejected.status().as_u16(),
                                snapshot.as_ref().map(|snapshot| &snapshot.0),
                                content_length(rejected.response().body().size()),
                            );
                            return Ok(rejected.map_into_right_body());
                        }
                    }
                } else {
                    None
                };
                let query = query_value(req.query_string());
                opened.log_incoming(req.headers(), &query, body.as_ref());
                tap = Some(opened);
            }

            let mut res = match service.call(req).await {
                Ok(res) => res,
                Err(err) => {
                    if let Some(open) = tap.as_mut() {
                        let status = err.as_response_error().status_code().as_u16();
                        open.complete(status, None, None);
                    }
                    return Err(err);
                }
            };

            insert_request_id(res.headers_mut(), request_id);
            if let Some(open) = tap.as_mut() {
                let status = res.status().as_u16();
                let length = content_length(res.response().body().size());
                let extensions = res.response().extensions();
                let snapshot = extensions.get::<ResponseSnapshot>().map(|snapshot| &snapshot.0);
                open.complete(status, snapshot, length);
            }
            Ok(res.map_into_left_body())
        }))
    }
}
