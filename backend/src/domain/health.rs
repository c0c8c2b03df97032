//! Health aggregation over the [`HealthSource`] port.

use std::sync::Arc;

use chrono::SecondsFormat;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::ports::{ConnectionState, ConnectionStatus, HealthSource, MemoryUsage};

const LOG_TARGET: &str = "sitescope::health";

/// Aggregate health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every dependency answered.
    Ok,
    /// At least one dependency is unavailable.
    Error,
}

/// Result of a full health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    /// Aggregate verdict.
    pub status: HealthStatus,
    /// ISO-8601 time the check ran.
    pub timestamp: String,
    /// Process uptime in seconds.
    pub uptime: f64,
    /// Backing store probe, absent when the probe itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ConnectionStatus>,
    /// Process memory, absent when the probe itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsage>,
}

impl HealthReport {
    /// Whether the aggregate verdict is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Service combining the connection probe and process figures.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use mockable::DefaultClock;
/// use sitescope_backend::domain::HealthService;
/// use sitescope_backend::domain::ports::FixtureHealthSource;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = HealthService::new(Arc::new(FixtureHealthSource), Arc::new(DefaultClock));
/// assert!(service.perform_health_check().await.is_healthy());
/// # });
/// ```
#[derive(Clone)]
pub struct HealthService {
    source: Arc<dyn HealthSource>,
    clock: Arc<dyn Clock>,
}

impl HealthService {
    /// Create a service over the given collaborator.
    pub fn new(source: Arc<dyn HealthSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }

    /// Run the full check.
    ///
    /// Never fails: a broken probe yields an `error` report carrying only the
    /// uptime.
    pub async fn perform_health_check(&self) -> HealthReport {
        let timestamp = self.clock.utc().to_rfc3339_opts(SecondsFormat::Millis, true);
        let system = self.source.system_info();
        match self.source.check_connection().await {
            Ok(database) => {
                let status = match database.status {
                    ConnectionState::Connected => HealthStatus::Ok,
                    ConnectionState::Disconnected => HealthStatus::Error,
                };
                HealthReport {
                    status,
                    timestamp,
                    uptime: system.uptime_seconds,
                    database: Some(database),
                    memory: Some(system.memory),
                }
            }
            Err(error) => {
                warn!(target: LOG_TARGET, %error, "health probe failed");
                HealthReport {
                    status: HealthStatus::Error,
                    timestamp,
                    uptime: system.uptime_seconds,
                    database: None,
                    memory: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Health aggregation behaviour.
    use super::*;
    use crate::domain::ports::{HealthSourceError, MockHealthSource, SystemInfo};
    use chrono::{TimeZone, Utc};
    use mockable::MockClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn clock() -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock
            .expect_utc()
            .returning(|| Utc.with_ymd_and_hms(2025, 8, 12, 6, 51, 53).single().unwrap_or_default());
        Arc::new(clock)
    }

    fn source_with(
        probe: Result<ConnectionStatus, HealthSourceError>,
    ) -> Arc<dyn HealthSource> {
        let mut source = MockHealthSource::new();
        source.expect_system_info().returning(|| SystemInfo {
            uptime_seconds: 12.5,
            memory: MemoryUsage::from_bytes(30, 120),
        });
        source
            .expect_check_connection()
            .return_once(move || probe);
        Arc::new(source)
    }

    #[rstest]
    #[tokio::test]
    async fn connected_probe_is_healthy(clock: Arc<dyn Clock>) {
        let service = HealthService::new(source_with(Ok(ConnectionStatus::connected(Some(3)))), clock);

        let report = service.perform_health_check().await;

        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.timestamp, "2025-08-12T06:51:53.000Z");
        assert_eq!(report.uptime, 12.5);
        assert_eq!(report.database, Some(ConnectionStatus::connected(Some(3))));
        assert_eq!(report.memory.map(|memory| memory.percentage), Some(25));
    }

    #[rstest]
    #[tokio::test]
    async fn disconnected_probe_is_unhealthy(clock: Arc<dyn Clock>) {
        let service = HealthService::new(source_with(Ok(ConnectionStatus::disconnected())), clock);

        let report = service.perform_health_check().await;

        assert!(!report.is_healthy());
        assert_eq!(report.database, Some(ConnectionStatus::disconnected()));
    }

    #[rstest]
    #[tokio::test]
    async fn broken_probe_reports_uptime_only(clock: Arc<dyn Clock>) {
        let service = HealthService::new(
            source_with(Err(HealthSourceError::probe("socket exploded"))),
            clock,
        );

        let report = service.perform_health_check().await;

        assert_eq!(report.status, HealthStatus::Error);
        assert_eq!(report.uptime, 12.5);
        assert!(report.database.is_none());
        assert!(report.memory.is_none());
    }
}
