//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_SERVER_URL=https://pos.example.com/api/v1                     │
//! │     TILL_DEVICE_ID=register-1                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till/sync.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.till.pos/sync.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     batch 50, page 100, both lanes every 4000ms                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "register-1"
//! name = "Front Counter"
//! branch_id = "branch-downtown"
//! user_id = "cashier-7"
//!
//! [server]
//! base_url = "https://pos.example.com/api/v1"
//! request_timeout_secs = 15
//!
//! [sync]
//! push_batch_size = 50
//! pull_limit = 100
//! push_interval_ms = 4000
//! pull_interval_ms = 4000
//! cursor_policy = "last_write"   # last_write | max
//!
//! [storage]
//! database_path = "/var/lib/till/till.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use till_core::validation::validate_limit;
use till_core::RuntimeContext;

use crate::error::{SyncError, SyncResult};

/// Upper bound the server accepts for a single push batch or pull page.
pub const MAX_PAGE_SIZE: usize = 1000;

// =============================================================================
// Cursor Policy
// =============================================================================

/// How a newly received server cursor is merged with the stored one.
///
/// ```text
///   stored = 40, push response says 38 (raced with a pull)
///
///   LastWrite  → 38   (whatever response finished last)
///   Max        → 40   (never moves backwards)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Store the value from the response that completed last.
    #[default]
    LastWrite,

    /// Keep the larger of the stored and received cursor.
    Max,
}

impl CursorPolicy {
    /// Returns the cursor to persist.
    pub fn merge(&self, stored: i64, received: i64) -> i64 {
        match self {
            CursorPolicy::LastWrite => received,
            CursorPolicy::Max => stored.max(received),
        }
    }
}

impl std::fmt::Display for CursorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorPolicy::LastWrite => write!(f, "last_write"),
            CursorPolicy::Max => write!(f, "max"),
        }
    }
}

impl std::str::FromStr for CursorPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last_write" | "last-write" => Ok(CursorPolicy::LastWrite),
            "max" => Ok(CursorPolicy::Max),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown cursor policy: '{}'. Valid options: last_write, max",
                other
            ))),
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this till. For the headless agent these fields form the
/// runtime context; an embedding UI supplies its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device id registered with the server.
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable device name (e.g., "Front Counter").
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Branch the device is assigned to.
    #[serde(default)]
    pub branch_id: Option<String>,

    /// Operator the agent acts as.
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_device_name() -> String {
    "Till".to_string()
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where the sync server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL, e.g. `https://pos.example.com/api/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_push_path")]
    pub push_path: String,

    #[serde(default = "default_pull_path")]
    pub pull_path: String,

    #[serde(default = "default_conflict_action_path")]
    pub conflict_action_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_push_path() -> String {
    "/sync/push".to_string()
}
fn default_pull_path() -> String {
    "/sync/pull".to_string()
}
fn default_conflict_action_path() -> String {
    "/sync/conflict-action".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            push_path: default_push_path(),
            pull_path: default_pull_path(),
            conflict_action_path: default_conflict_action_path(),
        }
    }
}

impl ServerSettings {
    /// Joins the base URL and an endpoint path with exactly one slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Batching and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Outbox events sent per push call.
    #[serde(default = "default_push_batch_size")]
    pub push_batch_size: usize,

    /// Updates requested per pull page.
    #[serde(default = "default_pull_limit")]
    pub pull_limit: usize,

    /// Interval between scheduled pushes (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub push_interval_ms: u64,

    /// Interval between scheduled pulls (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub pull_interval_ms: u64,

    #[serde(default)]
    pub cursor_policy: CursorPolicy,
}

fn default_push_batch_size() -> usize {
    50
}
fn default_pull_limit() -> usize {
    100
}
fn default_interval_ms() -> u64 {
    4000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            push_batch_size: default_push_batch_size(),
            pull_limit: default_pull_limit(),
            push_interval_ms: default_interval_ms(),
            pull_interval_ms: default_interval_ms(),
            cursor_policy: CursorPolicy::default(),
        }
    }
}

impl SyncSettings {
    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms)
    }

    /// Checks page sizes and lane periods.
    pub fn validate(&self) -> SyncResult<()> {
        validate_limit("push_batch_size", self.push_batch_size, MAX_PAGE_SIZE)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        validate_limit("pull_limit", self.pull_limit, MAX_PAGE_SIZE)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        if self.push_interval_ms == 0 || self.pull_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "push_interval_ms and pull_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Location of the local SQLite file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Explicit database path. Defaults to `<data dir>/till.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl StorageSettings {
    /// Resolves the database path, falling back to the platform data dir
    /// and finally the working directory.
    pub fn resolve_database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("till.db"))
                .unwrap_or_else(|| PathBuf::from("till.db"))
        })
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = &self.server.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must start with http:// or https://, got: {}",
                url
            )));
        }

        self.sync.validate()?;

        if self.server.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TILL_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the process env in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TILL_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = Some(id);
        }

        if let Some(name) = lookup("TILL_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(branch) = lookup("TILL_BRANCH_ID") {
            self.device.branch_id = Some(branch);
        }

        if let Some(user) = lookup("TILL_USER_ID") {
            self.device.user_id = Some(user);
        }

        if let Some(url) = lookup("TILL_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.base_url = url;
        }

        if let Some(secs) = lookup("TILL_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.server.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Some(size) = lookup("TILL_PUSH_BATCH_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.sync.push_batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid TILL_PUSH_BATCH_SIZE"),
            }
        }

        if let Some(limit) = lookup("TILL_PULL_LIMIT") {
            match limit.parse::<usize>() {
                Ok(n) => self.sync.pull_limit = n,
                Err(_) => warn!(value = %limit, "Ignoring invalid TILL_PULL_LIMIT"),
            }
        }

        if let Some(ms) = lookup("TILL_PUSH_INTERVAL_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.sync.push_interval_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring invalid TILL_PUSH_INTERVAL_MS"),
            }
        }

        if let Some(ms) = lookup("TILL_PULL_INTERVAL_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.sync.pull_interval_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring invalid TILL_PULL_INTERVAL_MS"),
            }
        }

        if let Some(policy) = lookup("TILL_CURSOR_POLICY") {
            match policy.parse() {
                Ok(parsed) => self.sync.cursor_policy = parsed,
                Err(_) => warn!(policy = %policy, "Unknown cursor policy in environment"),
            }
        }

        if let Some(path) = lookup("TILL_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Runtime context assembled from the `[device]` section.
    pub fn runtime_context(&self) -> RuntimeContext {
        RuntimeContext {
            device_id: self.device.id.clone(),
            branch_id: self.device.branch_id.clone(),
            user_id: self.device.user_id.clone(),
            shift: None,
        }
    }

    pub fn cursor_policy(&self) -> CursorPolicy {
        self.sync.cursor_policy
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "till", "pos")
}
