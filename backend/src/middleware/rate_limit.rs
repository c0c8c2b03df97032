//! Rate Admission Gate.
//!
//! Fixed-window counters keyed by policy name and client address. The
//! counters live in an injected [`CounterStore`], so every gate sharing a
//! store shares its windows and tests can start from an empty one.
//!
//! Requests over quota are answered with a classified 429 envelope and never
//! reach the wrapped service. Admitted responses carry `RateLimit-Limit`,
//! `RateLimit-Remaining` and `RateLimit-Reset`; rejections also carry
//! `Retry-After`. Rejections echo the request's `X-Request-ID`, minting one
//! when the gate sits outside the logging tap.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use actix_web::Error;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use mockable::Clock;
use tracing::warn;

use super::{client_ip, insert_request_id, redacted_url, request_id_of};
use crate::config::RuntimeMode;
use crate::domain;
use crate::inbound::http::classifier::error_response;
use crate::inbound::http::envelope::FailureOrigin;

const LOG_TARGET: &str = "sitescope::rate_limit";

const LIMIT_HEADER: &str = "ratelimit-limit";
const REMAINING_HEADER: &str = "ratelimit-remaining";
const RESET_HEADER: &str = "ratelimit-reset";

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

/// Quota applied by one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    /// Counter namespace; gates with different names never share counts.
    pub name: &'static str,
    /// Requests admitted per window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
    /// Message of the 429 envelope.
    pub message: &'static str,
    /// Give back the slot of every response below 400.
    pub skip_successful: bool,
}

impl RatePolicy {
    /// A policy counting every request.
    #[must_use]
    pub const fn new(
        name: &'static str,
        limit: u32,
        window: Duration,
        message: &'static str,
    ) -> Self {
        Self {
            name,
            limit,
            window,
            message,
            skip_successful: false,
        }
    }

    /// Count only requests that end in a client or server error.
    #[must_use]
    pub const fn failures_only(mut self) -> Self {
        self.skip_successful = true;
        self
    }

    /// 1000 requests per 15 minutes across the whole API.
    #[must_use]
    pub const fn global() -> Self {
        Self::new(
            "global",
            1000,
            FIFTEEN_MINUTES,
            "Too many requests from this IP, please try again later.",
        )
    }

    /// 100 requests per 15 minutes for expensive endpoints.
    #[must_use]
    pub const fn strict() -> Self {
        Self::new(
            "strict",
            100,
            FIFTEEN_MINUTES,
            "Too many requests for this endpoint, please try again later.",
        )
    }

    /// 10 failed attempts per 15 minutes for authentication endpoints.
    #[must_use]
    pub const fn auth() -> Self {
        Self::new(
            "auth",
            10,
            FIFTEEN_MINUTES,
            "Too many authentication attempts, please try again later.",
        )
        .failures_only()
    }

    /// 50 requests per hour for resource creation.
    #[must_use]
    pub const fn creation() -> Self {
        Self::new(
            "creation",
            50,
            ONE_HOUR,
            "Too many creation requests, please try again later.",
        )
    }
}

/// Count recorded for one key after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests seen in the current window, this one included.
    pub count: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}

/// Shared counter storage for rate gates.
///
/// Implementations must make `hit` atomic per key: concurrent requests from
/// one client each observe a distinct count.
#[cfg_attr(test, mockall::automock)]
pub trait CounterStore: Send + Sync {
    /// Record one request for `key`, opening a new window when the previous
    /// one ended at or before `now`.
    fn hit(&self, key: &str, now: DateTime<Utc>, window: Duration) -> WindowHit;

    /// Give back one request for `key` in its current window.
    fn undo(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Process-local [`CounterStore`] on a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, FixedWindow>,
}

impl InMemoryCounterStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop windows that ended at or before `now`.
    ///
    /// Returns the number of keys removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys with a live or expired window.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

fn window_end(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, key: &str, now: DateTime<Utc>, window: Duration) -> WindowHit {
        let mut entry = self
            .windows
            .entry(key.to_owned())
            .or_insert_with(|| FixedWindow {
                count: 0,
                reset_at: window_end(now, window),
            });
        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = window_end(now, window);
        }
        entry.count = entry.count.saturating_add(1);
        WindowHit {
            count: entry.count,
            reset_at: entry.reset_at,
        }
    }

    fn undo(&self, key: &str) {
        if let Some(mut entry) = self.windows.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
        }
    }
}

/// Header values for one admission decision.
#[derive(Debug, Clone, Copy)]
struct Quota {
    limit: u32,
    remaining: u32,
    reset_seconds: u64,
}

impl Quota {
    fn new(limit: u32, hit: WindowHit, now: DateTime<Utc>) -> Self {
        let millis = (hit.reset_at - now).num_milliseconds();
        Self {
            limit,
            remaining: limit.saturating_sub(hit.count),
            reset_seconds: u64::try_from(millis).unwrap_or(0).div_ceil(1000),
        }
    }

    const fn exceeded(self, hit: WindowHit) -> bool {
        hit.count > self.limit
    }

    fn apply(self, headers: &mut HeaderMap) {
        headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(self.limit));
        headers.insert(
            HeaderName::from_static(REMAINING_HEADER),
            HeaderValue::from(self.remaining),
        );
        headers.insert(
            HeaderName::from_static(RESET_HEADER),
            HeaderValue::from(self.reset_seconds),
        );
    }
}

/// Middleware admitting requests under a [`RatePolicy`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use actix_web::App;
/// use mockable::DefaultClock;
/// use sitescope_backend::config::RuntimeMode;
/// use sitescope_backend::middleware::{InMemoryCounterStore, RateGate, RatePolicy};
///
/// let gate = RateGate::new(
///     RatePolicy::global(),
///     Arc::new(InMemoryCounterStore::new()),
///     Arc::new(DefaultClock),
///     RuntimeMode::Production,
/// );
/// let app = App::new().wrap(gate);
/// ```
#[derive(Clone)]
pub struct RateGate {
    policy: Arc<RatePolicy>,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    mode: RuntimeMode,
    method: Option<Method>,
    enabled: bool,
}

impl RateGate {
    /// Gate counting into `store` with time read from `clock`.
    #[must_use]
    pub fn new(
        policy: RatePolicy,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        mode: RuntimeMode,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            store,
            clock,
            mode,
            method: None,
            enabled: true,
        }
    }

    /// Count only requests using `method`; others pass untouched.
    #[must_use]
    pub fn only_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Switch the gate off entirely when `enabled` is false.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateGateMiddleware {
            service,
            gate: self.clone(),
        }))
    }
}

/// Service wrapper produced by [`RateGate`].
pub struct RateGateMiddleware<S> {
    service: S,
    gate: RateGate,
}

impl RateGate {
    fn applies_to(&self, req: &ServiceRequest) -> bool {
        self.enabled
            && self
                .method
                .as_ref()
                .is_none_or(|method| method == req.method())
    }

    fn reject(&self, req: ServiceRequest, client: &str, quota: Quota) -> ServiceResponse {
        let policy = self.policy.as_ref();
        let request_id = request_id_of(&req);
        let url = redacted_url(req.path(), req.query_string());
        warn!(
            target: LOG_TARGET,
            policy = policy.name,
            limit = policy.limit,
            client_ip = client,
            request_id = %request_id,
            method = %req.method(),
            url = %url,
            "rate limit exceeded"
        );
        let origin = FailureOrigin {
            method: req.method().as_str(),
            path: req.path(),
            url: &url,
        };
        let mut response = error_response(
            &domain::Error::too_many_requests(policy.message),
            origin,
            self.mode,
        );
        let headers = response.headers_mut();
        quota.apply(headers);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(quota.reset_seconds));
        insert_request_id(headers, request_id);
        req.into_response(response)
    }
}

impl<S, B> Service<ServiceRequest> for RateGateMiddleware<S>
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
        if !self.gate.applies_to(&req) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let policy = Arc::clone(&self.gate.policy);
        let client = client_ip(&req);
        let key = format!("{}:{client}", policy.name);
        let now = self.gate.clock.utc();
        let hit = self.gate.store.hit(&key, now, policy.window);
        let quota = Quota::new(policy.limit, hit, now);

        if quota.exceeded(hit) {
            let rejected = self.gate.reject(req, &client, quota);
            return Box::pin(ready(Ok(rejected.map_into_right_body())));
        }

        let store = Arc::clone(&self.gate.store);
        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if policy.skip_successful && res.status().as_u16() < 400 {
                store.undo(&key);
            }
            quota.apply(res.headers_mut());
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    //! Admission decisions, headers and counter storage.
    use super::*;
    use crate::inbound::http::envelope::REQUEST_ID_HEADER;
    use crate::test_support::install_log_capture;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test, web};
    use chrono::TimeZone;
    use mockable::MockClock;
    use rstest::{fixture, rstest};
    use serde_json::Value;

    const TINY: RatePolicy = RatePolicy::new("tiny", 3, FIFTEEN_MINUTES, "Slow down.");

    #[fixture]
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 12, 12, 0, 0)
            .single()
            .expect("valid time")
    }

    fn frozen(at: DateTime<Utc>) -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_utc().return_const(at);
        Arc::new(clock)
    }

    fn gate(policy: RatePolicy, at: DateTime<Utc>) -> RateGate {
        RateGate::new(
            policy,
            Arc::new(InMemoryCounterStore::new()),
            frozen(at),
            RuntimeMode::Test,
        )
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn denied() -> HttpResponse {
        HttpResponse::Unauthorized().finish()
    }

    fn get(uri: &str, ip: &str) -> actix_http::Request {
        actix_test::TestRequest::get()
            .uri(uri)
            .insert_header(("x-forwarded-for", ip))
            .to_request()
    }

    fn header(response: &ServiceResponse<impl MessageBody>, name: &str) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    #[rstest]
    #[actix_web::test]
    async fn request_after_the_limit_is_rejected(noon: DateTime<Utc>) {
        let app = actix_test::init_service(
            App::new()
                .wrap(gate(TINY, noon))
                .route("/", web::get().to(ok)),
        )
        .await;

        for remaining in ["2", "1", "0"] {
            let response = actix_test::call_service(&app, get("/", "203.0.113.1")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header(&response, "ratelimit-limit").as_deref(), Some("3"));
            assert_eq!(header(&response, "ratelimit-remaining").as_deref(), Some(remaining));
            assert_eq!(header(&response, "ratelimit-reset").as_deref(), Some("900"));
        }

        let response = actix_test::call_service(&app, get("/", "203.0.113.1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, "retry-after").as_deref(), Some("900"));
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["error"], "Too Many Requests");
        assert_eq!(body["message"], "Slow down.");
    }

    #[rstest]
    #[actix_web::test]
    async fn clients_are_counted_separately(noon: DateTime<Utc>) {
        let app = actix_test::init_service(
            App::new()
                .wrap(gate(TINY, noon))
                .route("/", web::get().to(ok)),
        )
        .await;
        for _ in 0..3 {
            actix_test::call_service(&app, get("/", "203.0.113.1")).await;
        }
        let other = actix_test::call_service(&app, get("/", "203.0.113.2")).await;
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[rstest]
    #[actix_web::test]
    async fn failures_only_policy_ignores_successes(noon: DateTime<Utc>) {
        let policy = RatePolicy::new("login", 2, FIFTEEN_MINUTES, "Too many attempts.")
            .failures_only();
        let app = actix_test::init_service(
            App::new()
                .wrap(gate(policy, noon))
                .route("/ok", web::get().to(ok))
                .route("/denied", web::get().to(denied)),
        )
        .await;

        for _ in 0..5 {
            let response = actix_test::call_service(&app, get("/ok", "198.51.100.1")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        for _ in 0..2 {
            let response = actix_test::call_service(&app, get("/denied", "198.51.100.1")).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let response = actix_test::call_service(&app, get("/ok", "198.51.100.1")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[rstest]
    #[actix_web::test]
    async fn method_filter_and_disabled_gate_pass_through(noon: DateTime<Utc>) {
        let policy = RatePolicy::new("none", 0, FIFTEEN_MINUTES, "Never.");
        let filtered = actix_test::init_service(
            App::new()
                .wrap(gate(policy.clone(), noon).only_method(Method::POST))
                .route("/", web::get().to(ok)),
        )
        .await;
        let response = actix_test::call_service(&filtered, get("/", "192.0.2.1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(header(&response, "ratelimit-limit").is_none());

        let disabled = actix_test::init_service(
            App::new()
                .wrap(gate(policy, noon).enabled(false))
                .route("/", web::get().to(ok)),
        )
        .await;
        let response = actix_test::call_service(&disabled, get("/", "192.0.2.1")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[rstest]
    #[actix_web::test]
    async fn rejection_is_logged_as_warning(noon: DateTime<Utc>) {
        let (_guard, logs) = install_log_capture();
        let policy = RatePolicy::new("none", 0, FIFTEEN_MINUTES, "Never.");
        let app = actix_test::init_service(
            App::new()
                .wrap(gate(policy, noon))
                .route("/", web::get().to(ok)),
        )
        .await;
        actix_test::call_service(&app, get("/", "192.0.2.9")).await;

        let records = logs.records_for(LOG_TARGET);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "WARN");
        assert_eq!(records[0]["fields"]["policy"], "none");
        assert_eq!(records[0]["fields"]["client_ip"], "192.0.2.9");
    }

    #[rstest]
    fn windows_reset_after_they_end(noon: DateTime<Utc>) {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(60);
        assert_eq!(store.hit("k", noon, window).count, 1);
        assert_eq!(store.hit("k", noon + TimeDelta::seconds(59), window).count, 2);

        let fresh = store.hit("k", noon + TimeDelta::seconds(60), window);
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.reset_at, noon + TimeDelta::seconds(120));
    }

    #[rstest]
    fn undo_and_purge(noon: DateTime<Utc>) {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(60);
        store.hit("a", noon, window);
        store.hit("a", noon, window);
        store.undo("a");
        store.undo("missing");
        assert_eq!(store.hit("a", noon, window).count, 2);

        store.hit("b", noon + TimeDelta::seconds(30), window);
        assert_eq!(store.purge_expired(noon + TimeDelta::seconds(60)), 1);
        assert_eq!(store.tracked_keys(), 1);
    }

    #[rstest]
    #[actix_web::test]
    async fn gates_consult_the_injected_store(noon: DateTime<Utc>) {
        let mut store = MockCounterStore::new();
        store
            .expect_hit()
            .withf(|key, _, window| key == "strict:203.0.113.5" && *window == FIFTEEN_MINUTES)
            .times(1)
            .return_const(WindowHit {
                count: 101,
                reset_at: noon + TimeDelta::seconds(10),
            });
        store.expect_undo().never();
        let gate = RateGate::new(
            RatePolicy::strict(),
            Arc::new(store),
            frozen(noon),
            RuntimeMode::Test,
        );
        let app = actix_test::init_service(
            App::new()
                .wrap(gate)
                .route("/", web::get().to(ok)),
        )
        .await;

        let response = actix_test::call_service(&app, get("/", "203.0.113.5")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&response, "ratelimit-remaining").as_deref(), Some("0"));
        assert_eq!(header(&response, "retry-after").as_deref(), Some("10"));
        let request_id = header(&response, REQUEST_ID_HEADER).expect("request id echoed");
        assert!(request_id.parse::<crate::domain::RequestId>().is_ok());
    }

    #[rstest]
    #[actix_web::test]
    async fn successful_requests_are_given_back_to_the_store(noon: DateTime<Utc>) {
        let mut store = MockCounterStore::new();
        store.expect_hit().times(1).return_const(WindowHit {
            count: 1,
            reset_at: noon + TimeDelta::seconds(60),
        });
        store
            .expect_undo()
            .withf(|key| key == "auth:198.51.100.8")
            .times(1)
            .return_const(());
        let gate = RateGate::new(
            RatePolicy::auth(),
            Arc::new(store),
            frozen(noon),
            RuntimeMode::Test,
        );
        let app = actix_test::init_service(
            App::new()
                .wrap(gate)
                .route("/login", web::get().to(ok)),
        )
        .await;

        let response = actix_test::call_service(&app, get("/login", "198.51.100.8")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "ratelimit-remaining").as_deref(), Some("9"));
    }

    #[rstest]
    #[actix_web::test]
    async fn rejection_reuses_the_tap_request_id(noon: DateTime<Utc>) {
        let policy = RatePolicy::new("none", 0, FIFTEEN_MINUTES, "Never.");
        let app = actix_test::init_service(
            App::new()
                .wrap(gate(policy, noon))
                .wrap(crate::middleware::RequestLogging::default())
                .route("/", web::get().to(ok)),
        )
        .await;
        let response = actix_test::call_service(&app, get("/", "192.0.2.3")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let values: Vec<_> = response.headers().get_all(REQUEST_ID_HEADER).collect();
        assert_eq!(values.len(), 1);
    }

    #[rstest]
    #[case(RatePolicy::global(), 1000, 900, false)]
    #[case(RatePolicy::strict(), 100, 900, false)]
    #[case(RatePolicy::auth(), 10, 900, true)]
    #[case(RatePolicy::creation(), 50, 3600, false)]
    fn named_policies(
        #[case] policy: RatePolicy,
        #[case] limit: u32,
        #[case] window_secs: u64,
        #[case] skip_successful: bool,
    ) {
        assert_eq!(policy.limit, limit);
        assert_eq!(policy.window.as_secs(), window_secs);
        assert_eq!(policy.skip_successful, skip_successful);
    }
}
