use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Origin used when neither the config file nor `CODEALIVE_BASE_URL` names one.
pub const DEFAULT_BASE_URL: &str = "https://app.codealive.ai";

/// Environment variable overriding `[api].base_url`.
pub const BASE_URL_ENV: &str = "CODEALIVE_BASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for search, chat and data source calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for the key verification call made by `setup`.
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            verify_timeout_secs: default_verify_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_verify_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    /// Consult (and let `setup` write to) the OS credential store.
    #[serde(default = "default_os_store")]
    pub os_store: bool,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            os_store: default_os_store(),
        }
    }
}

fn default_os_store() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Base URL without a trailing slash, so paths can be appended directly.
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }
}

/// Default config location: `<config dir>/codealive/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("codealive").join("config.toml"))
}

/// Resolve the effective configuration.
///
/// An explicit path must exist. Without one, the default location is used
/// when present, otherwise built-in defaults apply. `CODEALIVE_BASE_URL`
/// is applied last in every case.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_config(&path)?,
            _ => Config::default(),
        },
    };

    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        if !url.trim().is_empty() {
            config.api.base_url = url.trim().to_string();
        }
    }

    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }
    if config.api.verify_timeout_secs == 0 {
        anyhow::bail!("api.verify_timeout_secs must be > 0");
    }

    let url = config.api.base_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!(
            "api.base_url must start with http:// or https:// (got '{}')",
            url
        );
    }

    match config.logging.level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
        other => anyhow::bail!(
            "Unknown logging.level: '{}'. Must be error, warn, info, debug, trace, or off.",
            other
        ),
    }

    Ok(())
}
