//! TOML file configuration for run defaults.
//!
//! Precedence is CLI flag > config file > built-in default. This module only
//! loads and range-checks the file; merging happens in the binary.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::pipeline::{MAX_LIMIT_PER_SOURCE, MAX_SEARCH_CONCURRENCY};

/// Directory name under the user config root.
pub const CONFIG_DIR_NAME: &str = "paperfetch";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Upper bound accepted for any timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Upper bound accepted for pacing bounds, in milliseconds.
pub const MAX_PACING_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        field: &'static str,
        value: String,
        expected: String,
    },
}

/// Values a config file may set. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub output_dir: Option<PathBuf>,
    /// Source priority list.
    pub sources: Option<Vec<String>>,
    pub max_concurrent_downloads: Option<usize>,
    pub max_concurrent_searches: Option<usize>,
    pub limit_per_source: Option<usize>,
    pub overwrite: Option<bool>,
    pub save_metadata: Option<bool>,
    pub fallback: Option<bool>,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// Lower bound of the pause between sources, in milliseconds.
    pub pacing_min_ms: Option<u64>,
    /// Upper bound of the pause between sources, in milliseconds.
    pub pacing_max_ms: Option<u64>,
}

impl FileConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates config values against the same ranges as the CLI.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range(
            "max_concurrent_downloads",
            self.max_concurrent_downloads,
            MIN_CONCURRENCY,
            MAX_CONCURRENCY,
        )?;
        validate_range(
            "max_concurrent_searches",
            self.max_concurrent_searches,
            1,
            MAX_SEARCH_CONCURRENCY,
        )?;
        validate_range("limit_per_source", self.limit_per_source, 1, MAX_LIMIT_PER_SOURCE)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, MAX_TIMEOUT_SECS)?;
        validate_range("timeout_secs", self.timeout_secs, 1, MAX_TIMEOUT_SECS)?;
        validate_range("pacing_min_ms", self.pacing_min_ms, 0, MAX_PACING_MS)?;
        validate_range("pacing_max_ms", self.pacing_max_ms, 0, MAX_PACING_MS)?;

        if let Some(sources) = &self.sources
            && sources.iter().all(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "sources",
                value: format!("{sources:?}"),
                expected: "at least one source name".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_range<T>(field: &'static str, value: Option<T>, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = value else {
        return Ok(());
    };
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            expected: format!("range {min}..={max}"),
        });
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// The path consulted, if one could be determined.
    pub path: Option<PathBuf>,
    /// Parsed file config when a file existed and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/paperfetch/config.toml`
/// 2. `$HOME/.config/paperfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn default_config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }
    let home = home?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. Without one, the default location is used
/// when present and silently skipped when absent.
///
/// # Errors
///
/// Returns [`ConfigError`] if a file exists but cannot be read, parsed, or
/// validated, or if an explicit path is missing.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default_path) if default_path.is_file() => {
            let config = load_file_config(default_path)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
            })
        }
        _ => {
            debug!(path = ?path, "no config file, using defaults");
            Ok(LoadedConfig { path, config: None })
        }
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::from_toml_str(&raw, path)?;
    debug!(path = %path.display(), "config file loaded");
    Ok(config)
}
