//! Domain ports for collaborators outside the process boundary.

mod health_source;

#[cfg(test)]
pub use health_source::MockHealthSource;
pub use health_source::{
    ConnectionState, ConnectionStatus, FixtureHealthSource, HealthSource, HealthSourceError,
    MemoryUsage, SystemInfo,
};
