//! On-disk configuration for keepsync.
//!
//! TOML store profiles layered with `KEEPSYNC_` environment variables,
//! and translation to `keepsync_core::SyncConfig`. The CLI is the main
//! consumer; anything hosting a `Synchronizer` from a config file can use
//! [`resolve_store`] directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keepsync_core::SyncConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "KEEPSYNC_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no store named '{name}' in {}", path.display())]
    StoreNotFound { name: String, path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Store used when none is named on the command line.
    pub default_store: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named store profiles.
    #[serde(default)]
    pub stores: BTreeMap<String, StoreProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_store: Some("default".into()),
            defaults: Defaults::default(),
            stores: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Save timeout in milliseconds. `0` disables it.
    #[serde(default)]
    pub save_timeout_ms: u64,

    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            save_timeout_ms: 0,
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "json".into()
}

/// A named store: where the value lives and how long a save may take.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreProfile {
    /// JSON file holding the value. Relative paths resolve against the
    /// directory of the config file.
    pub path: PathBuf,

    /// Overrides `defaults.save_timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_timeout_ms: Option<u64>,
}

impl StoreProfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_timeout_ms: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `KEEPSYNC_CONFIG` first, then XDG /
/// platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("dev", "keepsync", "keepsync").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("keepsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still layering `KEEPSYNC_` env vars on top.
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KEEPSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Store resolution ────────────────────────────────────────────────

impl Config {
    /// The store to use when the caller didn't name one.
    pub fn default_store_name(&self) -> &str {
        self.default_store.as_deref().unwrap_or("default")
    }

    /// Save timeout for values not backed by a named profile.
    pub fn default_save_timeout(&self) -> Option<Duration> {
        millis_to_timeout(self.defaults.save_timeout_ms)
    }

    /// Effective save timeout for a profile.
    pub fn save_timeout_for(&self, profile: &StoreProfile) -> Option<Duration> {
        millis_to_timeout(profile.save_timeout_ms.unwrap_or(self.defaults.save_timeout_ms))
    }

    /// Add or replace a store profile after validating it.
    pub fn insert_store(&mut self, name: &str, profile: StoreProfile) -> Result<(), ConfigError> {
        validate_store_name(name)?;
        validate_profile(&profile)?;
        self.stores.insert(name.to_owned(), profile);
        Ok(())
    }
}

fn millis_to_timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn validate_store_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: "store name".into(),
            reason: format!("'{name}' must be non-empty and use only letters, digits, '-' or '_'"),
        })
    }
}

fn validate_profile(profile: &StoreProfile) -> Result<(), ConfigError> {
    if profile.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            field: "path".into(),
            reason: "store path must not be empty".into(),
        });
    }
    Ok(())
}

/// Translate a profile into the runtime config for a `Synchronizer`.
///
/// Returns the absolute value-file path alongside the `SyncConfig`.
pub fn profile_to_sync_config(
    cfg: &Config,
    name: &str,
    profile: &StoreProfile,
    config_file: &Path,
) -> Result<(PathBuf, SyncConfig), ConfigError> {
    validate_profile(profile)?;

    let path = if profile.path.is_absolute() {
        profile.path.clone()
    } else {
        config_file
            .parent()
            .map_or_else(|| profile.path.clone(), |dir| dir.join(&profile.path))
    };

    let mut sync = SyncConfig::named(name);
    sync.save_timeout = cfg.save_timeout_for(profile);
    Ok((path, sync))
}

/// Look up a named store in `cfg`, falling back to its default store.
pub fn resolve_store_in(
    cfg: &Config,
    name: Option<&str>,
    config_file: &Path,
) -> Result<(PathBuf, SyncConfig), ConfigError> {
    let name = name.unwrap_or_else(|| cfg.default_store_name());
    let profile = cfg
        .stores
        .get(name)
        .ok_or_else(|| ConfigError::StoreNotFound {
            name: name.to_owned(),
            path: config_file.to_path_buf(),
        })?;
    profile_to_sync_config(cfg, name, profile, config_file)
}

/// Load the canonical config and resolve a named store.
pub fn resolve_store(name: Option<&str>) -> Result<(PathBuf, SyncConfig), ConfigError> {
    let path = config_path();
    let cfg = load_config_from(&path)?;
    resolve_store_in(&cfg, name, &path)
}
