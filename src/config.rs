//! Layered application configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `config.toml` in the platform config
//!    directory for `dupdup`)
//! 3. `DUPDUP_*` environment variables (`DUPDUP_MIN_SIZE=64KiB`)
//! 4. command-line flags
//!
//! Sizes are either a number of bytes or a string with the same suffixes as
//! `--min-size`.
//!
//! ```toml
//! min_size = "64KiB"
//! workers = 8
//! skip_hidden = true
//! ```

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::{parse_size, Cli};
use crate::duplicates::{default_workers, FinderConfig, DEFAULT_QUEUE_DEPTH};
use crate::scanner::WalkerConfig;
use crate::signal::ShutdownHandler;

/// Prefix of environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "DUPDUP_";

/// Default minimum file size: 1 MiB.
pub const DEFAULT_MIN_SIZE: u64 = 1024 * 1024;

/// Errors raised while loading or validating the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A provider failed to parse or a value has the wrong type.
    #[error("Invalid configuration: {0}")]
    Load(#[from] figment::Error),

    /// The merged values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files smaller than this are never considered
    #[serde(deserialize_with = "deserialize_size")]
    pub min_size: u64,
    /// Files larger than this are never considered
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_size"
    )]
    pub max_size: Option<u64>,
    /// Number of digest workers
    pub workers: usize,
    /// Capacity of the bounded queues between stages
    pub queue_depth: usize,
    /// Skip entries whose name starts with `.`
    pub skip_hidden: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: None,
            workers: default_workers(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            skip_hidden: false,
        }
    }
}

impl Config {
    /// Platform-specific location of the default config file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupdup").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, the given TOML file (if any) and variables under `env_prefix`.
    #[must_use]
    pub fn figment(file: Option<&Path>, env_prefix: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(env_prefix))
    }

    /// Load defaults, config file and environment.
    ///
    /// An explicit `path` must exist; the platform default is optional. The
    /// result is not validated, since command-line flags still apply on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit file is missing or a source
    /// cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        if let Some(file) = &file {
            log::debug!("Loading configuration from {}", file.display());
        }

        Ok(Self::figment(file.as_deref(), ENV_PREFIX).extract()?)
    }

    /// Apply command-line flags on top of the loaded values.
    #[must_use]
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(min_size) = cli.min_size {
            self.min_size = min_size;
        }
        if cli.max_size.is_some() {
            self.max_size = cli.max_size;
        }
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(depth) = cli.queue_depth {
            self.queue_depth = depth;
        }
        if let Some(skip_hidden) = cli.skip_hidden_override() {
            self.skip_hidden = skip_hidden;
        }
        self
    }

    /// Check that the values can drive a scan.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero workers, a zero queue depth,
    /// or a maximum size below the minimum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be at least 1".into()));
        }
        if let Some(max) = self.max_size {
            if max < self.min_size {
                return Err(ConfigError::Invalid(format!(
                    "max_size ({max}) is smaller than min_size ({})",
                    self.min_size
                )));
            }
        }
        Ok(())
    }

    /// Build the pipeline configuration.
    #[must_use]
    pub fn finder_config(&self, shutdown: ShutdownHandler) -> FinderConfig {
        FinderConfig::default()
            .with_workers(self.workers)
            .with_queue_depth(self.queue_depth)
            .with_walker_config(WalkerConfig::new(
                Some(self.min_size),
                self.max_size,
                self.skip_hidden,
            ))
            .with_shutdown(shutdown)
    }
}

struct SizeVisitor;

impl Visitor<'_> for SizeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number of bytes or a size such as \"4KiB\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        parse_size(v).map_err(E::custom)
    }
}

fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(SizeVisitor)
}

fn deserialize_optional_size<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    deserialize_size(deserializer).map(Some)
}
