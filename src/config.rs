// src/config.rs

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::address::Release;
use crate::error::{AcsError, Result};

pub const DEFAULT_BASE_URL: &str = "https://www2.census.gov/programs-surveys/acs/summary_file";
pub const DEFAULT_TIGER_URL: &str = "https://www2.census.gov/geo/tiger";

/// Runtime settings. Every field has a default, so a YAML file only needs the keys it
/// changes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root of the ACS summary-file tree, without a trailing slash.
    pub base_url: String,
    /// Root of the TIGER/Line boundary tree.
    pub tiger_base_url: String,
    /// When set, fetched files are kept here and reused.
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of (year, release) table catalogs held in memory.
    pub catalog_capacity: usize,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Vintage used by three-component addresses.
    pub default_year: u16,
    pub default_release: Release,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            tiger_base_url: DEFAULT_TIGER_URL.to_string(),
            cache_dir: None,
            catalog_capacity: 100,
            http_timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
            default_year: 2016,
            default_release: Release::Five,
        }
    }
}

impl Config {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Apply `ACS_*` environment variables on top of the current values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ACS_BASE_URL") {
            self.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ACS_TIGER_URL") {
            self.tiger_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ACS_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ACS_CATALOG_CAPACITY") {
            self.catalog_capacity = parse_env("ACS_CATALOG_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("ACS_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_env("ACS_HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ACS_MAX_RETRIES") {
            self.max_retries = parse_env("ACS_MAX_RETRIES", &v)?;
        }
        debug!(config = ?self, "resolved configuration");
        Ok(self)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, v: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| AcsError::Config(format!("{} must be a number, got '{}'", key, v)))
}
