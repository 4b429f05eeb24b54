use anyhow::{Context, Result, anyhow};
use shared::config::{LogFormat, SyncConfig};
use tracing_subscriber::EnvFilter;

/// Installs the global log subscriber. `RUST_LOG` wins over the configured
/// level. Logs go to stderr so command output stays clean.
pub fn init(config: &SyncConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
