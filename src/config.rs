//! Engine settings.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Bitbucket API root.
const DEFAULT_API_BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Default lifetime of cached GET responses in milliseconds.
const DEFAULT_CACHE_TTL_MS: u64 = 5000;

/// Default directory depth of local scans.
const DEFAULT_MAX_SCAN_DEPTH: usize = 8;

/// Default number of directories scanned at once.
const DEFAULT_SCAN_CONCURRENCY: usize = 16;

/// Default origin prefix for pending changes.
const DEFAULT_ORIGIN_PREFIX: &str = "local";

/// Settings shared by all drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the remote repository API
    pub api_base_url: String,

    /// How long a GET response is reused
    pub cache_ttl_ms: u64,

    /// Maximum directory depth of local scans
    pub max_scan_depth: usize,

    /// Maximum number of directories read concurrently
    pub scan_concurrency: usize,

    /// Host name put into commit messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_host: Option<String>,

    /// SQLite file holding pending changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_db: Option<PathBuf>,

    /// Scopes pending changes, e.g. per origin or per account
    pub origin_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            commit_host: None,
            change_db: None,
            origin_prefix: DEFAULT_ORIGIN_PREFIX.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Load `config.yml` from the user config directory, or defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Location of the user config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("texel").join("config.yml"))
    }

    /// Cache lifetime as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Get the pending change database path.
    pub fn change_db_path(&self) -> PathBuf {
        self.change_db.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("texel")
                .join("changes.db")
        })
    }

    /// Host name for commit messages.
    pub fn commit_host(&self) -> &str {
        self.commit_host.as_deref().unwrap_or("unknown host")
    }
}
