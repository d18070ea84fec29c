use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use crate::config::{Config, LogFormat};

pub fn init_logging(config: &Config) -> anyhow::Result<()> {
    // RUST_LOG prend le dessus sur LOG_LEVEL
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let formatting_layer = match config.log_format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Impossible d'initialiser les logs: {e}"))?;

    Ok(())
}
