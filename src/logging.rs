//! Structured logging via `tracing`.
//!
//! Installed by the binary only; the library just emits events.

use crate::error::VfsError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format: text or json
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "off".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Install the global subscriber. The `RUST_LOG` environment variable
/// overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), VfsError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| VfsError::Config(format!("invalid log level: {}", e)))?;

    let registry = Registry::default().with(filter);
    let result = match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "text" => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        other => {
            return Err(VfsError::Config(format!("unknown log format: {}", other)));
        }
    };
    result.map_err(|e| VfsError::Config(format!("failed to install subscriber: {}", e)))
}
