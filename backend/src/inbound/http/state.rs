//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain services and remain testable without I/O.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};

use crate::domain::HealthService;
use crate::domain::ports::{FixtureHealthSource, HealthSource};

/// Version reported by the welcome and liveness endpoints.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Health aggregate used by the detailed health endpoint.
    pub health: Arc<HealthService>,
    /// Time source for created records.
    pub clock: Arc<dyn Clock>,
}

impl HttpState {
    /// Build state from a health collaborator and a clock.
    pub fn new(source: Arc<dyn HealthSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            health: Arc::new(HealthService::new(source, Arc::clone(&clock))),
            clock,
        }
    }

    /// State backed by in-memory fixtures and the system clock.
    ///
    /// # Examples
    /// ```
    /// use sitescope_backend::inbound::http::state::HttpState;
    ///
    /// let _state = HttpState::fixture();
    /// ```
    #[must_use]
    pub fn fixture() -> Self {
        Self::new(Arc::new(FixtureHealthSource), Arc::new(DefaultClock))
    }
}
