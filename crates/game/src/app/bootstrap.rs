use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_config, ConfigError, DemoConfig};

pub(crate) struct AppWiring {
    pub(crate) config: DemoConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Grid Core Demo Startup ===");

    let config = load_config()?;
    info!(
        grid_width = config.grid_width,
        grid_height = config.grid_height,
        cell_width = config.cell_width,
        cell_height = config.cell_height,
        target_tps = config.target_tps,
        max_ticks = config.max_ticks,
        "demo_configured"
    );
    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
