//! Port for the health-data collaborator.
//!
//! The HTTP health controller never talks to the backing store or the
//! operating system directly. It consumes this port, which production backs
//! with a process probe and tests replace with a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reachability of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// The store answered the probe.
    Connected,
    /// The store did not answer.
    Disconnected,
}

/// Outcome of a connection probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Probe result.
    pub status: ConnectionState,
    /// Round-trip time of a successful probe.
    #[serde(rename = "responseTime", skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ConnectionStatus {
    /// Successful probe with an optional measured latency.
    #[must_use]
    pub const fn connected(response_time_ms: Option<u64>) -> Self {
        Self {
            status: ConnectionState::Connected,
            response_time_ms,
        }
    }

    /// Failed probe.
    #[must_use]
    pub const fn disconnected() -> Self {
        Self {
            status: ConnectionState::Disconnected,
            response_time_ms: None,
        }
    }
}

/// Process memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemoryUsage {
    /// Bytes in use.
    pub used: u64,
    /// Bytes reserved.
    pub total: u64,
    /// `used / total` as a rounded percentage.
    pub percentage: u8,
}

impl MemoryUsage {
    /// Build usage figures, deriving the rounded percentage.
    ///
    /// # Examples
    /// ```
    /// use sitescope_backend::domain::ports::MemoryUsage;
    ///
    /// let usage = MemoryUsage::from_bytes(512, 1024);
    /// assert_eq!(usage.percentage, 50);
    /// assert_eq!(MemoryUsage::from_bytes(1, 0).percentage, 0);
    /// ```
    #[must_use]
    pub fn from_bytes(used: u64, total: u64) -> Self {
        // Rounds half up; a zero total reads as 0%.
        let scaled = u128::from(used)
            .saturating_mul(100)
            .saturating_add(u128::from(total) >> 1)
            .checked_div(u128::from(total))
            .unwrap_or(0);
        let percentage = u8::try_from(scaled.min(100)).unwrap_or(100);
        Self {
            used,
            total,
            percentage,
        }
    }
}

/// Process-level figures reported alongside the probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemInfo {
    /// Seconds since the process started.
    pub uptime_seconds: f64,
    /// Memory usage of the process.
    pub memory: MemoryUsage,
}

/// Errors raised by a health source that could not complete a probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthSourceError {
    /// The probe could not be started.
    #[error("health probe failed: {message}")]
    Probe {
        /// Underlying failure text.
        message: String,
    },
}

impl HealthSourceError {
    /// Convenience constructor for [`HealthSourceError::Probe`].
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe {
            message: message.into(),
        }
    }
}

/// Port exposing connectivity and process information.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Probe the backing store.
    ///
    /// A store that is simply unreachable is reported as
    /// [`ConnectionState::Disconnected`]; `Err` means the probe itself broke.
    async fn check_connection(&self) -> Result<ConnectionStatus, HealthSourceError>;

    /// Snapshot of process uptime and memory.
    fn system_info(&self) -> SystemInfo;
}

/// Fixture source that always reports a healthy process.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureHealthSource;

#[async_trait]
impl HealthSource for FixtureHealthSource {
    async fn check_connection(&self) -> Result<ConnectionStatus, HealthSourceError> {
        Ok(ConnectionStatus::connected(Some(1)))
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            uptime_seconds: 42.0,
            memory: MemoryUsage::from_bytes(64, 128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(1, 200, 1)]
    #[case(1, 201, 0)]
    #[case(300, 200, 100)]
    #[case(u64::MAX, u64::MAX, 100)]
    #[case(5, 0, 0)]
    fn percentage_rounds_half_up(#[case] used: u64, #[case] total: u64, #[case] expected: u8) {
        assert_eq!(MemoryUsage::from_bytes(used, total).percentage, expected);
    }
}
