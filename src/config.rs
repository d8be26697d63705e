//! Layered application configuration.
//!
//! Settings are merged with figment, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file: `--config FILE`, or `config.toml` in the platform config
//!    directory when it exists
//! 3. `DUPESWEEP_*` environment variables (`DUPESWEEP_WORKERS=8`)
//! 4. command-line flags
//!
//! ```toml
//! workers = 8
//! backend = "processes"
//! algorithm = "md5"
//! chunk_size = 65536
//! verify = false
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::engine::default_workers;
use crate::pool::PoolBackend;
use crate::scanner::{DigestAlgorithm, DEFAULT_CHUNK_SIZE};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DUPESWEEP_";

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    /// A layer could not be parsed or has a value of the wrong type.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum concurrent hash computations.
    pub workers: usize,
    /// Hashing execution model.
    pub backend: PoolBackend,
    /// Content digest algorithm.
    pub algorithm: DigestAlgorithm,
    /// Read chunk size in bytes.
    pub chunk_size: usize,
    /// Confirm duplicate sets byte-by-byte before deleting.
    pub verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            backend: PoolBackend::default(),
            algorithm: DigestAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify: false,
        }
    }
}

/// Values given on the command line; `None` leaves lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    /// `--workers`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// `--backend`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<PoolBackend>,
    /// `--algorithm`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<DigestAlgorithm>,
    /// `--chunk-size`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// `--verify`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,
}

impl Config {
    /// Platform-specific default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "dupesweep", "dupesweep")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Figment with defaults, file and environment layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if `file` is given but missing.
    pub fn figment(file: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load every layer, command-line overrides last.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer is missing or malformed.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file)?
            .merge(Serialized::defaults(overrides))
            .extract()
            .map_err(Box::new)?;
        log::debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}
