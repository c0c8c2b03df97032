//! Tracing subscriber setup.
//!
//! Subsystems log under their own targets so operators can filter them:
//! `sitescope::http` for the request tap, `sitescope::error` for the error
//! classifier, `sitescope::rate_limit` for admission gates,
//! `sitescope::health` for health aggregation and `sitescope::server` for
//! startup.

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Failure to install (for example
/// because a subscriber already exists) is reported and otherwise ignored.
pub fn init_tracing(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    if let Err(error) = installed {
        warn!(error = %error, "tracing initialization failed");
    }
}
