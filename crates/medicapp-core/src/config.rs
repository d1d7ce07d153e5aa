//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, last used username/portal, refresh policy and request timeout.
//!
//! Configuration is stored at `~/.config/medicapp/config.json`. The base URL
//! can be overridden with `MEDICAPP_API_BASE_URL` (a `.env` file is honoured
//! by the CLI). The session file defaults to `~/.cache/medicapp/` unless
//! `session_dir` points elsewhere, e.g. one directory per clinic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::RefreshPolicy;
use crate::auth::ViewerRole;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "medicapp";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured API base URL
pub const BASE_URL_ENV: &str = "MEDICAPP_API_BASE_URL";

/// Base URL used when neither config nor environment provide one
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    pub last_role: Option<ViewerRole>,
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    pub request_timeout_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub session_dir: Option<PathBuf>,
}

/// `<base>/medicapp`, for a platform directory that may not exist.
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    base.map(|dir| dir.join(APP_NAME))
        .with_context(|| format!("Could not determine the user {} directory", kind))
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Write the config, replacing any previous file in one rename.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let staged = path.with_extension("json.tmp");
        std::fs::write(&staged, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", staged.display()))?;
        std::fs::rename(&staged, path)
            .with_context(|| format!("Failed to save config file {}", path.display()))
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf> {
        Ok(app_dir(dirs::config_dir(), "config")?.join(CONFIG_FILE))
    }

    /// Directory holding the persisted session.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.session_dir {
            Some(dir) => Ok(dir.clone()),
            None => app_dir(dirs::cache_dir(), "cache"),
        }
    }

    /// Effective API base URL, without a trailing slash.
    pub fn api_base_url(&self) -> String {
        self.resolve_base_url(std::env::var(BASE_URL_ENV).ok())
    }

    fn resolve_base_url(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}
