//! SiteScope entry point: loads settings, installs logging and serves the API.

use color_eyre::eyre::{Result, WrapErr, eyre};
use ortho_config::OrthoConfig;
use tracing::info;

use sitescope_backend::config::ServerSettings;
use sitescope_backend::server::{ServerConfig, create_server};
use sitescope_backend::telemetry::init_tracing;

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = ServerSettings::load_from_iter(std::env::args_os())
        .map_err(|error| eyre!("failed to load configuration: {error}"))?;
    let mode = settings.runtime_mode()?;
    init_tracing(&settings.log_filter(mode), settings.log_format()?);

    let config = ServerConfig::from_settings(&settings)?;
    info!(
        target: "sitescope::server",
        host = config.host(),
        port = config.port(),
        environment = %mode,
        "starting SiteScope API"
    );

    create_server(config)
        .wrap_err("failed to bind HTTP listener")?
        .await
        .wrap_err("HTTP server stopped with an error")
}
