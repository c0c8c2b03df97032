//! HTTP server configuration object and helpers.

use crate::config::{ConfigError, RuntimeMode, ServerSettings};
use crate::middleware::TapSettings;

/// Resolved configuration for creating the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) mode: RuntimeMode,
    pub(crate) tap: TapSettings,
    pub(crate) json_limit_bytes: usize,
    pub(crate) rate_limit_enabled: bool,
    pub(crate) health_probe_addr: Option<String>,
}

impl ServerConfig {
    /// Resolve layered settings into a server configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the environment name is not recognised.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, ConfigError> {
        let mode = settings.runtime_mode()?;
        Ok(Self {
            host: settings.host().to_owned(),
            port: settings.port(),
            mode,
            tap: TapSettings {
                log_bodies: settings.verbose_request_logs(mode),
                mode,
                ..TapSettings::default()
            },
            json_limit_bytes: settings.json_limit_bytes(),
            rate_limit_enabled: settings.rate_limit_enabled(),
            health_probe_addr: settings.health_probe_addr.clone(),
        })
    }

    /// Host the listener binds to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the listener binds to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Runtime mode the server classifies errors under.
    #[must_use]
    pub const fn mode(&self) -> RuntimeMode {
        self.mode
    }
}
