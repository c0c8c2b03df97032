//! Server configuration loaded via OrthoConfig.
//!
//! Values layer from defaults, an optional configuration file, environment
//! variables prefixed with `SITESCOPE_`, and command-line flags.

use std::fmt;
use std::str::FromStr;

use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_JSON_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const ENVIRONMENT_EXPECTED: &str = "development|production|test";
const LOG_FORMAT_EXPECTED: &str = "json|pretty";

/// Deployment mode controlling information exposure and log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    /// Local development: internal failure messages reach clients.
    #[default]
    Development,
    /// Production: internal failure messages are replaced by a generic string.
    Production,
    /// Automated tests: behaves like development.
    Test,
}

impl RuntimeMode {
    /// Whether raw internal failure text must be hidden from clients.
    #[must_use]
    pub const fn hides_internal_errors(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Default log filter for the mode.
    #[must_use]
    pub const fn default_log_level(self) -> &'static str {
        match self {
            Self::Production => "info",
            Self::Development | Self::Test => "debug",
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            _ => Err(ConfigError::InvalidValue {
                name: "environment",
                value: value.to_owned(),
                expected: ENVIRONMENT_EXPECTED,
            }),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::InvalidValue {
                name: "log_format",
                value: value.to_owned(),
                expected: LOG_FORMAT_EXPECTED,
            }),
        }
    }
}

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A setting is present but holds an unsupported value.
    #[error("invalid value for {name}='{value}'; expected {expected}")]
    InvalidValue {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// Accepted values.
        expected: &'static str,
    },
}

/// Raw server settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SITESCOPE")]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: Option<String>,
    /// Port to bind.
    pub port: Option<u16>,
    /// Deployment mode: development, production or test.
    pub environment: Option<String>,
    /// Log filter directive overriding the mode default.
    pub log_level: Option<String>,
    /// Log output format: json or pretty.
    pub log_format: Option<String>,
    /// Include response bodies of successful requests in completion logs.
    pub log_bodies: Option<bool>,
    /// `host:port` the health collaborator probes.
    pub health_probe_addr: Option<String>,
    /// Maximum accepted JSON body size in bytes.
    pub json_limit_bytes: Option<usize>,
    /// Disable every rate admission gate when false.
    pub rate_limit_enabled: Option<bool>,
}

impl ServerSettings {
    /// Interface to bind, falling back to all interfaces.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Port to bind, falling back to 3000.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Parsed deployment mode, defaulting to development.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unknown modes.
    pub fn runtime_mode(&self) -> Result<RuntimeMode, ConfigError> {
        self.environment
            .as_deref()
            .map_or(Ok(RuntimeMode::default()), str::parse)
    }

    /// Parsed log format, defaulting to JSON.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unknown formats.
    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.log_format
            .as_deref()
            .map_or(Ok(LogFormat::default()), str::parse)
    }

    /// Log filter directive for the given mode.
    pub fn log_filter(&self, mode: RuntimeMode) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| mode.default_log_level().to_owned())
    }

    /// Maximum accepted JSON body size, falling back to 10 MiB.
    pub fn json_limit_bytes(&self) -> usize {
        self.json_limit_bytes.unwrap_or(DEFAULT_JSON_LIMIT_BYTES)
    }

    /// Whether admission gates are mounted, defaulting to true.
    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit_enabled.unwrap_or(true)
    }

    /// Whether successful response bodies are logged, defaulting to false.
    pub fn log_bodies(&self) -> bool {
        self.log_bodies.unwrap_or(false)
    }

    /// Whether the logging tap runs at debug verbosity.
    ///
    /// Explicit `log_bodies` or a `debug`/`trace` log level enables it.
    pub fn verbose_request_logs(&self, mode: RuntimeMode) -> bool {
        let filter = self.log_filter(mode).to_ascii_lowercase();
        self.log_bodies() || filter == "debug" || filter == "trace"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for server configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 9] = [
        "SITESCOPE_HOST",
        "SITESCOPE_PORT",
        "SITESCOPE_ENVIRONMENT",
        "SITESCOPE_LOG_LEVEL",
        "SITESCOPE_LOG_FORMAT",
        "SITESCOPE_LOG_BODIES",
        "SITESCOPE_HEALTH_PROBE_ADDR",
        "SITESCOPE_JSON_LIMIT_BYTES",
        "SITESCOPE_RATE_LIMIT_ENABLED",
    ];

    fn load_from_empty_args() -> ServerSettings {
        ServerSettings::load_from_iter([OsString::from("sitescope")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.host(), DEFAULT_HOST);
        assert_eq!(settings.port(), DEFAULT_PORT);
        assert_eq!(settings.runtime_mode(), Ok(RuntimeMode::Development));
        assert_eq!(settings.log_format(), Ok(LogFormat::Json));
        assert_eq!(settings.json_limit_bytes(), DEFAULT_JSON_LIMIT_BYTES);
        assert!(settings.rate_limit_enabled());
        assert!(!settings.log_bodies());
        assert!(settings.health_probe_addr.is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("SITESCOPE_HOST", Some("127.0.0.1".to_owned())),
            ("SITESCOPE_PORT", Some("8081".to_owned())),
            ("SITESCOPE_ENVIRONMENT", Some("production".to_owned())),
            ("SITESCOPE_LOG_LEVEL", Some("warn".to_owned())),
            ("SITESCOPE_LOG_FORMAT", Some("pretty".to_owned())),
            ("SITESCOPE_LOG_BODIES", None),
            ("SITESCOPE_HEALTH_PROBE_ADDR", Some("db:5432".to_owned())),
            ("SITESCOPE_JSON_LIMIT_BYTES", Some("2048".to_owned())),
            ("SITESCOPE_RATE_LIMIT_ENABLED", None),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(settings.host(), "127.0.0.1");
        assert_eq!(settings.port(), 8081);
        assert_eq!(settings.runtime_mode(), Ok(RuntimeMode::Production));
        assert_eq!(settings.log_format(), Ok(LogFormat::Pretty));
        assert_eq!(settings.log_filter(RuntimeMode::Production), "warn");
        assert_eq!(settings.health_probe_addr.as_deref(), Some("db:5432"));
        assert_eq!(settings.json_limit_bytes(), 2048);
        assert!(settings.rate_limit_enabled());
    }

    #[rstest]
    fn boolean_switches_follow_the_environment() {
        let _guard = lock_env([
            ("SITESCOPE_LOG_BODIES", Some("true")),
            ("SITESCOPE_RATE_LIMIT_ENABLED", Some("false")),
            ("SITESCOPE_LOG_LEVEL", Some("info")),
            ("SITESCOPE_ENVIRONMENT", None),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.log_bodies());
        assert!(!settings.rate_limit_enabled());
        assert!(settings.verbose_request_logs(RuntimeMode::Production));
    }

    #[rstest]
    #[case("production", RuntimeMode::Production)]
    #[case("PROD", RuntimeMode::Production)]
    #[case("development", RuntimeMode::Development)]
    #[case(" test ", RuntimeMode::Test)]
    fn runtime_mode_parses_known_values(#[case] raw: &str, #[case] expected: RuntimeMode) {
        assert_eq!(raw.parse::<RuntimeMode>(), Ok(expected));
    }

    #[rstest]
    fn runtime_mode_rejects_unknown_values() {
        let err = "staging".parse::<RuntimeMode>().expect_err("unknown mode");
        assert_eq!(
            err.to_string(),
            "invalid value for environment='staging'; expected development|production|test"
        );
    }

    #[rstest]
    #[case(RuntimeMode::Production, true)]
    #[case(RuntimeMode::Development, false)]
    #[case(RuntimeMode::Test, false)]
    fn only_production_hides_internal_errors(#[case] mode: RuntimeMode, #[case] hidden: bool) {
        assert_eq!(mode.hides_internal_errors(), hidden);
    }
}
