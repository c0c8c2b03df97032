//! Server construction and middleware wiring.
//!
//! Middleware runs outermost first: the global [`RateGate`], the
//! [`RequestLogging`] tap, then [`ErrorEnvelope`]. Actix runs the last `wrap`
//! first, so the calls below appear in reverse. Requests rejected by the
//! global gate never reach the tap.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::{App, HttpServer, Resource, web};
use mockable::{Clock, DefaultClock};
use tracing::debug;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use crate::config::RuntimeMode;
#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::inbound::http::demo_users::{create_user, get_user, list_users};
use crate::inbound::http::health::{detailed, liveness};
use crate::inbound::http::root::{not_found, welcome};
use crate::inbound::http::state::HttpState;
use crate::middleware::{
    CounterStore, ErrorEnvelope, InMemoryCounterStore, RateGate, RatePolicy, RequestLogging,
};
use crate::outbound::health::ProcessHealthSource;

/// How often expired rate windows are dropped from the in-memory store.
const COUNTER_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The admission gates mounted by [`build_app`], sharing one counter store.
#[derive(Clone)]
pub struct RateGates {
    global: RateGate,
    strict: RateGate,
    creation: RateGate,
}

impl RateGates {
    /// Build the global, strict and creation gates.
    ///
    /// With `enabled` false every gate passes requests through untouched.
    #[must_use]
    pub fn new(
        store: &Arc<dyn CounterStore>,
        clock: &Arc<dyn Clock>,
        mode: RuntimeMode,
        enabled: bool,
    ) -> Self {
        let gate = |policy: RatePolicy| {
            RateGate::new(policy, Arc::clone(store), Arc::clone(clock), mode).enabled(enabled)
        };
        Self {
            global: gate(RatePolicy::global()),
            strict: gate(RatePolicy::strict()),
            creation: gate(RatePolicy::creation()).only_method(Method::POST),
        }
    }
}

/// Everything [`build_app`] needs; cloned once per worker.
#[derive(Clone)]
pub struct AppDependencies {
    /// Handler state.
    pub http_state: web::Data<HttpState>,
    /// Mode errors are classified under.
    pub mode: RuntimeMode,
    /// Logging tap middleware.
    pub logging: RequestLogging,
    /// Maximum accepted body size in bytes.
    pub json_limit_bytes: usize,
    /// Admission gates.
    pub gates: RateGates,
}

/// A resource answering unmatched methods with the classified 404.
fn resource(path: &str) -> Resource {
    web::resource(path).default_service(web::to(not_found))
}

/// Assemble the application: routes, fallback and middleware.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        http_state,
        mode,
        logging,
        json_limit_bytes,
        gates,
    } = deps;

    let demo = web::scope("/api/demo")
        .service(
            resource("/users")
                .route(web::post().to(create_user))
                .route(web::get().to(list_users))
                .wrap(gates.creation),
        )
        .service(resource("/users/{id}").route(web::get().to(get_user)));

    let app = App::new()
        .app_data(http_state)
        .app_data(web::PayloadConfig::new(json_limit_bytes))
        .service(resource("/").route(web::get().to(welcome)))
        .service(resource("/health").route(web::get().to(liveness)))
        .service(
            resource("/health/detailed")
                .route(web::get().to(detailed))
                .wrap(gates.strict),
        )
        .service(demo);

    #[cfg(debug_assertions)]
    let app = app.service(
        SwaggerUi::new("/api-docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app.default_service(web::to(not_found))
        .wrap(ErrorEnvelope::new(mode))
        .wrap(logging)
        .wrap(gates.global)
}

/// Periodically drop expired windows so idle clients do not accumulate.
fn spawn_counter_purge(store: Arc<InMemoryCounterStore>, clock: Arc<dyn Clock>) {
    actix_web::rt::spawn(async move {
        let mut tick = actix_web::rt::time::interval(COUNTER_PURGE_INTERVAL);
        tick.tick().await;
        loop {
            tick.tick().await;
            let removed = store.purge_expired(clock.utc());
            if removed > 0 {
                debug!(
                    target: "sitescope::rate_limit",
                    removed,
                    remaining = store.tracked_keys(),
                    "purged expired rate windows"
                );
            }
        }
    });
}

/// Construct an Actix HTTP server from a resolved [`ServerConfig`].
///
/// Must be called inside the actix system runtime.
///
/// # Returns
/// A [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(config: ServerConfig) -> std::io::Result<Server> {
    let ServerConfig {
        host,
        port,
        mode,
        tap,
        json_limit_bytes,
        rate_limit_enabled,
        health_probe_addr,
    } = config;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let http_state = web::Data::new(HttpState::new(
        Arc::new(ProcessHealthSource::new(health_probe_addr)),
        Arc::clone(&clock),
    ));
    let counters = Arc::new(InMemoryCounterStore::new());
    let store: Arc<dyn CounterStore> = counters.clone();
    let deps = AppDependencies {
        http_state,
        mode,
        logging: RequestLogging::new(tap),
        json_limit_bytes,
        gates: RateGates::new(&store, &clock, mode, rate_limit_enabled),
    };

    let server = HttpServer::new(move || build_app(deps.clone()))
        .bind((host, port))?
        .run();

    if rate_limit_enabled {
        spawn_counter_purge(counters, clock);
    }
    Ok(server)
}
