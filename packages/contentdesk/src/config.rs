use std::path::PathBuf;
use std::time::Duration;

use contentdesk_http::{TransportConfig, DEFAULT_TIMEOUT};
use serde::Deserialize;

use crate::error::Error;

pub const API_URL_ENV: &str = "CONTENTDESK_API_URL";
pub const TIMEOUT_ENV: &str = "CONTENTDESK_TIMEOUT_MS";
pub const STORAGE_PATH_ENV: &str = "CONTENTDESK_STORAGE_PATH";

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

/// API base URL baked in at build time, if any.
const BUILD_API_URL: Option<&str> = option_env!("CONTENTDESK_API_URL");

/// Dashboard configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub timeout_ms: u64,
    /// Session file location. `None` uses the per-user data directory.
    pub storage_path: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: BUILD_API_URL.unwrap_or(DEFAULT_API_URL).to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            storage_path: None,
        }
    }
}

impl DashboardConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Runtime environment first, then the build-time URL, then the local default.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.api_base_url = url;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{} must be a number of milliseconds, got {:?}",
                    TIMEOUT_ENV, raw
                ))
            })?;
        }
        if let Some(path) = lookup(STORAGE_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            config.storage_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn transport_config(&self) -> Result<TransportConfig, Error> {
        let config = TransportConfig::new(&self.api_base_url).map_err(|e| {
            Error::config(format!("invalid API base URL {:?}: {}", self.api_base_url, e))
        })?;
        Ok(config.with_timeout(self.timeout()))
    }
}
