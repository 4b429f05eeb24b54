use anyhow::Result;
use clap::ValueEnum;
use shared::config::SyncConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

/// Renders the default configuration in the given format.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_config(format: ConfigFormat) -> Result<String> {
    let config = SyncConfig::with_defaults();
    let rendered = match format {
        ConfigFormat::Yaml => serde_yml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };
    Ok(rendered)
}

/// Prints the default configuration, ready to be saved as a config file.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn print_config(format: ConfigFormat) -> Result<()> {
    println!("{}", render_config(format)?);
    Ok(())
}
