//! Configuration types for the reconciler
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main Lighthouse configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LighthouseConfig {
    /// Registry endpoint configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Cache file configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl LighthouseConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.registry.validate()?;
        self.cache.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

/// Registry endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// JSON-RPC endpoint of the registry daemon
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Transport-level timeout for a single HTTP request (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Registry URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Registry URL must use http or https: {}",
                self.url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Registry request timeout must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Cache file configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache file path; `~/.lighthouse_cache` when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            return Err(crate::Error::config("Cache path cannot be empty"));
        }
        Ok(())
    }

    /// The configured path, or the default location in the home directory
    pub fn resolve_path(&self) -> Result<PathBuf, crate::Error> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => crate::state::default_cache_path(),
        }
    }
}

/// When the reconciler writes its snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// After every refreshed entry, whether it validated or was quarantined
    #[default]
    PerEntry,
    /// Once at the end of a cycle that changed anything
    PerCycle,
}

impl std::str::FromStr for PersistMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "per_entry" | "entry" => Ok(Self::PerEntry),
            "per_cycle" | "cycle" => Ok(Self::PerCycle),
            other => Err(crate::Error::config(format!(
                "Unknown persist mode '{}'. Valid: per_entry, per_cycle",
                other
            ))),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Interval between reconciliation cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Budget for each registry call made by the reconciler (in seconds)
    ///
    /// A listing that exceeds it skips the cycle; a resolve that exceeds it
    /// quarantines the claim.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Snapshot write granularity
    #[serde(default)]
    pub persist_mode: PersistMode,

    /// Capacity of the event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Registry call timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            persist_mode: PersistMode::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_registry_url() -> String {
    "http://localhost:5279/lbryapi".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    256
}
