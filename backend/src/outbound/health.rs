//! Outbound adapter reporting store reachability and process figures.

use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::warn;

use crate::domain::ports::{
    ConnectionStatus, HealthSource, HealthSourceError, MemoryUsage, SystemInfo,
};

/// Default upper bound on one connection probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// [`HealthSource`] probing a TCP endpoint and reading this process's memory.
///
/// Without a probe address the store is reported as connected with no
/// measured latency.
#[derive(Debug, Clone)]
pub struct ProcessHealthSource {
    probe_addr: Option<String>,
    timeout: Duration,
    started: Instant,
}

impl ProcessHealthSource {
    /// Probe `probe_addr` (`host:port`) with the default timeout.
    #[must_use]
    pub fn new(probe_addr: Option<String>) -> Self {
        Self {
            probe_addr,
            timeout: DEFAULT_PROBE_TIMEOUT,
            started: Instant::now(),
        }
    }

    /// Replace the probe timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl HealthSource for ProcessHealthSource {
    async fn check_connection(&self) -> Result<ConnectionStatus, HealthSourceError> {
        let Some(addr) = self.probe_addr.as_deref() else {
            return Ok(ConnectionStatus::connected(None));
        };

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                let latency = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                Ok(ConnectionStatus::connected(Some(latency)))
            }
            Ok(Err(error)) if error.kind() == io::ErrorKind::InvalidInput => {
                Err(HealthSourceError::probe(format!("{addr}: {error}")))
            }
            Ok(Err(error)) => {
                warn!(target: "sitescope::health", %addr, %error, "store probe failed");
                Ok(ConnectionStatus::disconnected())
            }
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(target: "sitescope::health", %addr, timeout_ms, "store probe timed out");
                Ok(ConnectionStatus::disconnected())
            }
        }
    }

    fn system_info(&self) -> SystemInfo {
        let memory = memory_stats::memory_stats().map_or_else(
            || MemoryUsage::from_bytes(0, 0),
            |stats| MemoryUsage::from_bytes(to_u64(stats.physical_mem), to_u64(stats.virtual_mem)),
        );
        SystemInfo {
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            memory,
        }
    }
}
