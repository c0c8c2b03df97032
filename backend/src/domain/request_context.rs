//! Per-request correlation state.
//!
//! Every inbound request receives a [`RequestId`] and a [`RequestContext`]
//! at entry. The identifier is also held in task-local storage so failures
//! raised deep inside a handler can be correlated without threading the
//! context through every call.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`RequestId::scope`] when moving work onto another task.

use std::future::Future;
use std::net::IpAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::task_local;
use uuid::Uuid;

task_local! {
    static REQUEST_ID: RequestId;
}

/// Opaque correlation identifier, unique per request.
///
/// # Examples
/// ```
/// use sitescope_backend::domain::RequestId;
///
/// async fn handler() {
///     if let Some(id) = RequestId::current() {
///         println!("request id: {id}");
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random identifier.
    #[must_use]
    #[rustfmt::skip]
    pub fn generate() -> Self { Self(Uuid::new_v4()) }

    /// Returns the identifier of the request currently in scope.
    #[must_use]
    #[rustfmt::skip]
    pub fn current() -> Option<Self> { REQUEST_ID.try_with(|id| *id).ok() }

    /// Execute the future with the supplied identifier in scope.
    ///
    /// # Examples
    /// ```
    /// use sitescope_backend::domain::RequestId;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let id: RequestId = "00000000-0000-0000-0000-000000000000"
    ///     .parse()
    ///     .expect("valid UUID");
    /// let observed = RequestId::scope(id, async move { RequestId::current() }).await;
    /// assert_eq!(observed, Some(id));
    /// # });
    /// ```
    pub async fn scope<Fut>(request_id: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        REQUEST_ID.scope(request_id, fut).await
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Request-scoped state created at entry and discarded after the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation identifier echoed in the `X-Request-ID` header.
    pub request_id: RequestId,
    /// Wall-clock time the request arrived.
    pub start_time: DateTime<Utc>,
    /// Monotonic instant used to compute elapsed time.
    pub started_at: Instant,
    /// Resolved client address.
    pub client_ip: String,
}

impl RequestContext {
    /// Open a context for a request arriving now.
    #[must_use]
    pub fn start(start_time: DateTime<Utc>, client_ip: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            start_time,
            started_at: Instant::now(),
            client_ip: client_ip.into(),
        }
    }

    /// Milliseconds elapsed since the request arrived.
    #[must_use]
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

/// Fallback when no address information is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the client address from proxy headers and the socket peer.
///
/// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket address.
///
/// # Examples
/// ```
/// use sitescope_backend::domain::resolve_client_ip;
///
/// let ip = resolve_client_ip(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.2"), None);
/// assert_eq!(ip, "203.0.113.7");
/// ```
#[must_use]
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<IpAddr>,
) -> String {
    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }
    if let Some(ip) = real_ip.map(str::trim).filter(|value| !value.is_empty()) {
        return ip.to_owned();
    }
    peer.map_or_else(|| UNKNOWN_CLIENT.to_owned(), |ip| ip.to_string())
}
