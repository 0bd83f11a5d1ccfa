//! Runtime configuration
//!
//! Defaults, then an optional TOML file, then `STOCKWATCH_*` environment
//! variables (a `.env` file is honoured by the binary).

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
    pub token_refresh_secs: u64,
    pub login_path: String,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub api_key: String,
    pub auth_url: String,
    pub token_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            data_dir: PathBuf::from(".stockwatch"),
            request_timeout_secs: 30,
            analysis_timeout_secs: 300,
            token_refresh_secs: 3000,
            login_path: "/login".to_string(),
            identity: IdentityConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file (if it exists) and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| AppError::Config(format!("Invalid config file {:?}: {}", path, e)))?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STOCKWATCH_*` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STOCKWATCH_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(dir) = lookup("STOCKWATCH_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("STOCKWATCH_IDENTITY_API_KEY") {
            self.identity.api_key = key;
        }
        if let Some(url) = lookup("STOCKWATCH_IDENTITY_AUTH_URL") {
            self.identity.auth_url = url;
        }
        if let Some(url) = lookup("STOCKWATCH_IDENTITY_TOKEN_URL") {
            self.identity.token_url = url;
        }
        if let Some(secs) = lookup("STOCKWATCH_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_secs("STOCKWATCH_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("STOCKWATCH_ANALYSIS_TIMEOUT_SECS") {
            self.analysis_timeout_secs = parse_secs("STOCKWATCH_ANALYSIS_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("STOCKWATCH_TOKEN_REFRESH_SECS") {
            self.token_refresh_secs = parse_secs("STOCKWATCH_TOKEN_REFRESH_SECS", &secs)?;
        }
        Ok(())
    }

    /// Check that URLs parse and durations are usable
    pub fn validate(&self) -> Result<()> {
        self.backend_base()?;
        if self.request_timeout_secs == 0 || self.analysis_timeout_secs == 0 {
            return Err(AppError::Config("Timeouts must be greater than zero".to_string()));
        }
        if self.token_refresh_secs == 0 {
            return Err(AppError::Config(
                "Token refresh interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Backend base URL
    pub fn backend_base(&self) -> Result<Url> {
        Url::parse(&self.backend_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL '{}': {}", self.backend_url, e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_secs)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a whole number of seconds", key)))
}
