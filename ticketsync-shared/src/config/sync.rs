use std::{env, fs, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

use crate::models::FetchMode;

pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported configuration format for {0}; use 'yaml' or 'json'")]
    UnsupportedFormat(PathBuf),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Resolved settings for talking to both message backends.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the paginated platform API
    pub platform_base_url: String,

    /// Base URL of the live session API (history queries and event stream)
    pub live_base_url: String,

    /// Backend used when a caller does not pick one
    pub fetch_mode: FetchMode,

    /// Number of messages requested per page
    pub page_size: u32,

    /// Timeout applied to each history request
    pub request_timeout_secs: u64,

    /// Timeout for establishing connections, including the event stream
    pub connect_timeout_secs: u64,

    /// Logging level
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SyncConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            platform_base_url: "http://localhost:8080/api/platform/".to_string(),
            live_base_url: "http://localhost:8080/api/live/".to_string(),
            fetch_mode: FetchMode::Live,
            page_size: 50,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Values present in the file win; environment variables only fill in
    /// settings the file left at their defaults.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, an
    /// environment override is malformed, or the result fails [`Self::validate`].
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(
            fetch_mode = %config.fetch_mode,
            page_size = config.page_size,
            "configuration loaded"
        );
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|err| ConfigError::Parse {
                    path: path.clone(),
                    message: err.to_string(),
                })
            }
            Some("json") => serde_json::from_str(&content).map_err(|err| ConfigError::Parse {
                path: path.clone(),
                message: err.to_string(),
            }),
            _ => Err(ConfigError::UnsupportedFormat(path)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let defaults = Self::with_defaults();

        if self.platform_base_url == defaults.platform_base_url {
            if let Ok(url) = env::var("TICKETSYNC_PLATFORM_URL") {
                self.platform_base_url = url;
            }
        }
        if self.live_base_url == defaults.live_base_url {
            if let Ok(url) = env::var("TICKETSYNC_LIVE_URL") {
                self.live_base_url = url;
            }
        }
        if self.fetch_mode == defaults.fetch_mode {
            if let Ok(mode) = env::var("TICKETSYNC_FETCH_MODE") {
                self.fetch_mode = parse_env("TICKETSYNC_FETCH_MODE", &mode)?;
            }
        }
        if self.page_size == defaults.page_size {
            if let Ok(size) = env::var("TICKETSYNC_PAGE_SIZE") {
                self.page_size = parse_env("TICKETSYNC_PAGE_SIZE", &size)?;
            }
        }
        if self.request_timeout_secs == defaults.request_timeout_secs {
            if let Ok(secs) = env::var("TICKETSYNC_REQUEST_TIMEOUT_SECS") {
                self.request_timeout_secs = parse_env("TICKETSYNC_REQUEST_TIMEOUT_SECS", &secs)?;
            }
        }
        if self.log_level == defaults.log_level {
            if let Ok(level) = env::var("TICKETSYNC_LOG_LEVEL") {
                self.log_level = level;
            }
        }
        if self.log_format == defaults.log_format {
            if let Ok(format) = env::var("TICKETSYNC_LOG_FORMAT") {
                self.log_format = parse_env("TICKETSYNC_LOG_FORMAT", &format)?;
            }
        }

        Ok(())
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_base_url("platform_base_url", &self.platform_base_url)?;
        parse_base_url("live_base_url", &self.live_base_url)?;

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "page_size",
                message: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "connect_timeout_secs",
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Parsed platform base URL.
    ///
    /// # Errors
    /// Fails when the configured value is not an absolute URL.
    pub fn platform_url(&self) -> Result<Url, ConfigError> {
        parse_base_url("platform_base_url", &self.platform_base_url)
    }

    /// Parsed live base URL.
    ///
    /// # Errors
    /// Fails when the configured value is not an absolute URL.
    pub fn live_url(&self) -> Result<Url, ConfigError> {
        parse_base_url("live_base_url", &self.live_base_url)
    }
}

fn parse_env<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        message: format!("could not parse '{raw}'"),
    })
}

fn parse_base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidValue {
        key,
        message: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            key,
            message: format!("'{raw}' cannot be used as a base URL"),
        });
    }
    Ok(url)
}
