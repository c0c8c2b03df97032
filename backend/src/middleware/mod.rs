//! Request middleware.
//!
//! Purpose: define middleware components for request lifecycle concerns:
//! correlation and logging, terminal error classification, and per-client
//! rate admission.
//!
//! Mount order, outermost first: [`RateGate`] (global policy),
//! [`RequestLogging`], [`ErrorEnvelope`], then routes. Actix runs the last
//! `wrap` call first.

use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::HttpMessage;
use tracing::error;

use crate::domain::{RequestContext, RequestId, resolve_client_ip};
use crate::inbound::http::envelope::REQUEST_ID_HEADER;

pub mod error_envelope;
pub mod rate_limit;
pub mod request_log;

pub use error_envelope::ErrorEnvelope;
pub use rate_limit::{CounterStore, InMemoryCounterStore, RateGate, RatePolicy};
pub use request_log::{RequestLogging, TapSettings};

/// Client address of a request: `X-Forwarded-For` first entry, then
/// `X-Real-IP`, then the socket peer.
pub(crate) fn client_ip(req: &ServiceRequest) -> String {
    let headers = req.headers();
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    resolve_client_ip(
        header("x-forwarded-for"),
        header("x-real-ip"),
        req.peer_addr().map(|addr| addr.ip()),
    )
}

/// Identifier of the request: the one the logging tap assigned, or a fresh
/// one when the request never passed through the tap.
pub(crate) fn request_id_of(req: &ServiceRequest) -> RequestId {
    req.extensions()
        .get::<RequestContext>()
        .map_or_else(RequestId::generate, |context| context.request_id)
}

/// Echo `request_id` in the `X-Request-ID` response header.
pub(crate) fn insert_request_id(headers: &mut HeaderMap, request_id: RequestId) {
    match HeaderValue::from_str(&request_id.to_string()) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        Err(error) => {
            error!(
                target: "sitescope::http",
                %error,
                request_id = %request_id,
                "failed to encode request identifier header"
            );
        }
    }
}

/// Request path plus its query string with sensitive values redacted.
///
/// # Examples
/// ```
/// use sitescope_backend::middleware::redacted_url;
///
/// assert_eq!(
///     redacted_url("/login", "user=ann&Password=hunter2"),
///     "/login?user=ann&Password=[REDACTED]"
/// );
/// assert_eq!(redacted_url("/", ""), "/");
/// ```
#[must_use]
pub fn redacted_url(path: &str, query_string: &str) -> String {
    if query_string.is_empty() {
        return path.to_owned();
    }
    let pairs: Vec<String> = query_string
        .split('&')
        .map(|pair| {
            let raw_name = pair.split_once('=').map_or(pair, |(name, _)| name);
            let name: String = url::form_urlencoded::parse(raw_name.as_bytes())
                .map(|(decoded, _)| decoded.into_owned())
                .next()
                .unwrap_or_default();
            if request_log::is_sensitive(&name) {
                format!("{raw_name}={}", request_log::REDACTED)
            } else {
                pair.to_owned()
            }
        })
        .collect();
    format!("{path}?{}", pairs.join("&"))
}

#[cfg(test)]
mod tests {
    //! Shared request helpers.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a", "", "/a")]
    #[case("/a", "page=2", "/a?page=2")]
    #[case("/a", "password=hunter2&page=2", "/a?password=[REDACTED]&page=2")]
    #[case("/a", "TOKEN=t&key", "/a?TOKEN=[REDACTED]&key=[REDACTED]")]
    #[case("/a", "pass%77ord=x", "/a?pass%77ord=[REDACTED]")]
    fn urls_never_carry_sensitive_values(
        #[case] path: &str,
        #[case] query: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(redacted_url(path, query), expected);
    }
}
