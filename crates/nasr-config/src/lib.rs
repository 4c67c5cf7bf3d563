//! Configuration for the facility cache and its binaries.
//!
//! Configuration is read from TOML (`nasr.toml`), every field has a default,
//! and a small set of environment variables override individual values.
//!
//! ```toml
//! [cache]
//! root = ".nasr/cache"
//! use_existing = true
//! ttl_days = 28
//!
//! [cache.airports]
//! capacity = 10
//! version = 1
//!
//! [logging]
//! level = "nasr.cache=debug,info"
//! ```

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// Overrides [`NASR_CONFIG_FILE`] discovery with an explicit path.
pub const NASR_CONFIG_ENV_VAR: &str = "NASR_CONFIG_PATH";

/// Overrides [`CacheSettings::root`].
pub const NASR_CACHE_DIR_ENV_VAR: &str = "NASR_CACHE_DIR";

pub const NASR_CONFIG_FILE: &str = "nasr.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NasrConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the facility caches live and how each store is sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Parent directory of the per-store directories (`apt/`, `rwy/`).
    #[serde(default = "CacheSettings::default_root")]
    pub root: PathBuf,

    /// Reuse a valid persisted cache instead of always rebuilding.
    #[serde(default = "CacheSettings::default_use_existing")]
    pub use_existing: bool,

    /// Lifetime of a freshly built cache, in days.
    #[serde(default = "CacheSettings::default_ttl_days")]
    pub ttl_days: u32,

    #[serde(default = "StoreSettings::default_airports")]
    pub airports: StoreSettings,

    #[serde(default = "StoreSettings::default_runways")]
    pub runways: StoreSettings,
}

impl CacheSettings {
    fn default_root() -> PathBuf {
        PathBuf::from(".nasr/cache")
    }

    fn default_use_existing() -> bool {
        true
    }

    // One NASR publication cycle.
    fn default_ttl_days() -> u32 {
        28
    }

    pub fn airport_dir(&self) -> PathBuf {
        self.root.join("apt")
    }

    pub fn runway_dir(&self) -> PathBuf {
        self.root.join("rwy")
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * 24 * 60 * 60)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            use_existing: Self::default_use_existing(),
            ttl_days: Self::default_ttl_days(),
            airports: StoreSettings::default_airports(),
            runways: StoreSettings::default_runways(),
        }
    }
}

/// Sizing of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    /// Maximum number of materialized values.
    pub capacity: NonZeroUsize,

    /// Format version; a persisted cache with another version is rebuilt.
    #[serde(default = "StoreSettings::default_version")]
    pub version: i32,
}

impl StoreSettings {
    fn default_version() -> i32 {
        1
    }

    fn default_airports() -> Self {
        Self {
            capacity: NonZeroUsize::MIN.saturating_add(9),
            version: Self::default_version(),
        }
    }

    fn default_runways() -> Self {
        Self {
            capacity: NonZeroUsize::MIN.saturating_add(49),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file as well. If it cannot be opened, file logging
    /// is skipped and the other sinks stay active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level, with `RUST_LOG` appended when set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }

    fn make_writer(&self) -> BoxMakeWriter {
        let file = self
            .file
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(Arc::new);

        match (self.stderr, file) {
            (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(file)),
            (true, None) => BoxMakeWriter::new(std::io::stderr),
            (false, Some(file)) => BoxMakeWriter::new(file),
            (false, None) => BoxMakeWriter::new(std::io::sink),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The `Display` form embeds a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl NasrConfig {
    /// Load a config file from TOML. A relative `cache.root` is resolved
    /// against the file's directory.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::load_from_str(&text)?;
        if config.cache.root.is_relative() {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                config.cache.root = dir.join(&config.cache.root);
            }
        }
        Ok(config)
    }

    /// Parse and validate a TOML document. Relative paths are left as written.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: NasrConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_days == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.ttl_days",
                reason: "a cache must live for at least one day".to_string(),
            });
        }
        if self.cache.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "cache.root",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(NASR_CACHE_DIR_ENV_VAR).filter(|value| !value.trim().is_empty()) {
            tracing::debug!(target: "nasr.config", root = %root, "cache root overridden from environment");
            self.cache.root = PathBuf::from(root);
        }
        self
    }
}

/// Find the config file for `dir`: [`NASR_CONFIG_ENV_VAR`] if set (relative to
/// `dir`), otherwise `nasr.toml` or `.nasr/config.toml` if either exists.
pub fn discover_config_path(dir: &Path) -> Option<PathBuf> {
    discover_config_path_from(dir, |name| std::env::var_os(name).map(PathBuf::from))
}

fn discover_config_path_from(
    dir: &Path,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(candidate) = lookup(NASR_CONFIG_ENV_VAR) {
        return Some(if candidate.is_absolute() {
            candidate
        } else {
            dir.join(candidate)
        });
    }

    [NASR_CONFIG_FILE, ".nasr/config.toml"]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load the configuration for `dir`, falling back to defaults when no file is
/// found. Environment overrides are applied either way.
pub fn load_for_dir(dir: &Path) -> Result<(NasrConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(dir) else {
        return Ok((NasrConfig::default().with_env_overrides(), None));
    };
    let config = NasrConfig::load_from_path(&path)?.with_env_overrides();
    Ok((config, Some(path)))
}

static TRACING_INIT: Once = Once::new();

/// Install the global `tracing` subscriber.
///
/// Safe to call more than once; only the first call has an effect. Returns
/// `true` if this call installed the subscriber.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();
        let writer = config.make_writer();

        let layer: Box<dyn Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();
    });
    installed
}
