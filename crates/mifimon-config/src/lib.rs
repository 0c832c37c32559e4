//! Configuration for the mifimon CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `mifimon_core::ControllerConfig`. The CLI layers
//! its global flags on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mifimon_core::{ControllerConfig, Credentials};

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "mifimon";

/// Environment variable consulted first for the router password.
pub const PASSWORD_ENV: &str = "MIFIMON_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' has a username but no password")]
    NoPassword { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named router profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, then the configured
    /// default, then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    5
}

/// A named router profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Router address (e.g., "192.168.1.1").
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Login name. Without one the router is polled unauthenticated.
    pub username: Option<String>,

    /// Plaintext password (prefer the keyring or `MIFIMON_PASSWORD`).
    pub password: Option<String>,

    /// Override the global timeout (seconds).
    pub timeout: Option<u64>,

    /// Device poll interval in seconds.
    pub device_poll_secs: Option<u64>,

    /// Status poll interval in seconds.
    pub status_poll_secs: Option<u64>,

    /// Probe round-trip latency on every device poll.
    pub measure_latency: Option<bool>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            timeout: None,
            device_poll_secs: None,
            status_poll_secs: None,
            measure_latency: None,
        }
    }
}

fn default_host() -> String {
    "192.168.1.1".into()
}
fn default_port() -> u16 {
    80
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "mifimon", "mifimon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("mifimon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path`, then `MIFIMON_*` environment variables
/// (nested keys separated by `__`, e.g. `MIFIMON_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MIFIMON_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Store `password` for `profile_name` in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Password chain: `MIFIMON_PASSWORD`, system keyring, plaintext profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(pw));
    }

    // 2. Keyring
    if let Some(pw) = keyring_entry(profile_name)
        .ok()
        .and_then(|entry| entry.get_password().ok())
    {
        return Some(SecretString::from(pw));
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Login credentials for a profile.
///
/// `Ok(None)` when the profile has no username; the router is then
/// polled without a session.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Credentials>, ConfigError> {
    let Some(username) = profile.username.clone().filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let password = resolve_password(profile, profile_name).ok_or_else(|| ConfigError::NoPassword {
        profile: profile_name.into(),
    })?;
    Ok(Some(Credentials { username, password }))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile, no CLI overrides.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    validate_profile(profile)?;
    let credentials = resolve_credentials(profile, profile_name)?;
    let base = ControllerConfig::default();

    Ok(ControllerConfig {
        host: profile.host.trim().to_owned(),
        port: profile.port,
        credentials,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        device_poll_interval: profile
            .device_poll_secs
            .map_or(base.device_poll_interval, Duration::from_secs),
        status_poll_interval: profile
            .status_poll_secs
            .map_or(base.status_poll_interval, Duration::from_secs),
        measure_latency: profile.measure_latency.unwrap_or(base.measure_latency),
        ..base
    })
}

fn validate_profile(profile: &Profile) -> Result<(), ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() || host.contains(['/', ' ']) {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("expected a hostname or IP address, got '{}'", profile.host),
        });
    }
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "port must be non-zero".into(),
        });
    }
    if profile.timeout == Some(0) {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "timeout must be at least 1 second".into(),
        });
    }
    Ok(())
}
