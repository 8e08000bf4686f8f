//! Application configuration.
//!
//! Layers, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. The TOML file (`--config <PATH>` or `audiotool.toml` in the working
//!    directory), written with the defaults when it does not exist
//! 3. `AUDIOTOOL_`-prefixed environment variables, `__` separating
//!    sections (`AUDIOTOOL_DATABASE__TIMEOUT=10`)
//!
//! ```toml
//! [database]
//! path = "cache/audiotool.db"
//! timeout = 5
//! lock_timeout = 60
//! backup = true
//!
//! [processing]
//! chunk_size = 1024
//! validation_timeout = 30
//! probe_timeout = 10
//! ffmpeg = "ffmpeg"
//! ffprobe = "ffprobe"
//!
//! [export]
//! default_format = "json"
//! output_dir = "exports"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::output::ExportFormat;
use crate::store::StoreOptions;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "audiotool.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "AUDIOTOOL_";

/// Errors loading configuration. All are fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// `[database]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// SQLite busy timeout, seconds
    pub timeout: u64,
    /// Advisory lock wait, seconds
    pub lock_timeout: u64,
    /// Defaults to `<path>.lock`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<PathBuf>,
    pub backup: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache/audiotool.db"),
            timeout: 5,
            lock_timeout: 60,
            lock_path: None,
            backup: true,
        }
    }
}

/// `[processing]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Pool size; CPU count when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    /// Hash read buffer, KiB
    pub chunk_size: usize,
    /// ffmpeg deadline, seconds
    pub validation_timeout: u64,
    /// ffprobe deadline, seconds
    pub probe_timeout: u64,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            chunk_size: 1024,
            validation_timeout: 30,
            probe_timeout: 10,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// `[export]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Format used by a bare `--export`
    pub default_format: ExportFormat,
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::Json,
            output_dir: PathBuf::from("exports"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub processing: ProcessingConfig,
    pub export: ExportConfig,
}

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "database",
        &["path", "timeout", "lock_timeout", "lock_path", "backup"],
    ),
    (
        "processing",
        &[
            "max_workers",
            "chunk_size",
            "validation_timeout",
            "probe_timeout",
            "ffmpeg",
            "ffprobe",
        ],
    ),
    ("export", &["default_format", "output_dir"]),
];

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when `None`.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from_path`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from_path(path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE)))
    }

    /// Load all layers, creating the file with defaults if it is missing.
    ///
    /// Unknown keys are logged with the closest known key.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read or created,
    /// [`ConfigError::Parse`] if it is not valid TOML or a value has the
    /// wrong type, [`ConfigError::Invalid`] for out-of-range values.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::default().save(path)?;
            log::info!("Created default config file {}", path.display());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = text.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        for (key, suggestion) in unknown_keys(&table) {
            match suggestion {
                Some(known) => log::warn!(
                    "Unknown config key '{}' in {} (did you mean '{}'?)",
                    key,
                    path.display(),
                    known
                ),
                None => log::warn!("Unknown config key '{}' in {}", key, path.display()),
            }
        }

        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults < TOML file < environment.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let content = format!(
            "# audiotool configuration\n\
             # Environment variables override these values, e.g. AUDIOTOOL_DATABASE__TIMEOUT=10\n\n{body}"
        );
        fs::write(path, content).map_err(io_err)
    }

    /// Reject values the rest of the program cannot work with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::Invalid {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if self.processing.chunk_size == 0 {
            return invalid("processing.chunk_size", "must be at least 1 KiB");
        }
        if self.processing.max_workers == Some(0) {
            return invalid("processing.max_workers", "must be at least 1");
        }
        if self.processing.validation_timeout == 0 {
            return invalid("processing.validation_timeout", "must be at least 1 second");
        }
        if self.processing.probe_timeout == 0 {
            return invalid("processing.probe_timeout", "must be at least 1 second");
        }
        if self.database.path.as_os_str().is_empty() {
            return invalid("database.path", "must not be empty");
        }
        Ok(())
    }

    /// Store settings derived from `[database]`.
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        let db = &self.database;
        let mut options = StoreOptions::new(&db.path)
            .with_busy_timeout(Duration::from_secs(db.timeout))
            .with_lock_timeout(Duration::from_secs(db.lock_timeout))
            .with_backup(db.backup);
        if let Some(ref lock_path) = db.lock_path {
            options = options.with_lock_path(lock_path);
        }
        options
    }

    /// Hash read buffer in bytes.
    #[must_use]
    pub fn chunk_size_bytes(&self) -> usize {
        self.processing.chunk_size.saturating_mul(1024)
    }

    #[must_use]
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.validation_timeout)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.processing.probe_timeout)
    }
}

/// Keys in `table` that no section knows, with the closest known key.
fn unknown_keys(table: &toml::Table) -> Vec<(String, Option<String>)> {
    let sections: Vec<&str> = KNOWN_KEYS.iter().map(|(s, _)| *s).collect();
    let mut unknown = Vec::new();

    for (section, value) in table {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(s, _)| *s == section.as_str()) else {
            unknown.push((section.clone(), closest(section, &sections)));
            continue;
        };
        if let Some(inner) = value.as_table() {
            for key in inner.keys() {
                if !keys.contains(&key.as_str()) {
                    unknown.push((format!("{section}.{key}"), closest(key, keys)));
                }
            }
        }
    }
    unknown
}

fn closest(key: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (c, strsim::normalized_levenshtein(key, c)))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| (*c).to_string())
}
