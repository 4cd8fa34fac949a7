//! CLI configuration: defaults, optional TOML file, environment.

use crate::error::VfsError;
use crate::logging::LoggingConfig;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tool configuration. Environment variables use the `SEALFS_` prefix
/// (`SEALFS_STORE_DIR`, `SEALFS_KEY_SEED`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the blob store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Key seed phrase for signing commands. Prefer the environment over
    /// the config file for this one.
    #[serde(default)]
    pub key_seed: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".sealfs")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_dir: default_store_dir(),
            key_seed: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the optional file, then the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Config, VfsError> {
        let mut builder = ConfigBuilder::builder();
        if let Some(path) = file {
            let path = path
                .to_str()
                .ok_or_else(|| VfsError::Config("non-UTF-8 config path".to_string()))?;
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }
        builder
            .add_source(Environment::with_prefix("SEALFS").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| VfsError::Config(e.to_string()))
    }
}
