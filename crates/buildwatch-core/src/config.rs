//! Configuration types for the buildwatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Masters to monitor
    pub masters: Vec<MasterConfig>,

    /// Master data-source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Build cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Event sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Instance-health oracle configuration
    #[serde(default)]
    pub health: HealthConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl MonitorConfig {
    /// Create a new configuration with defaults and no masters
    pub fn new() -> Self {
        Self {
            masters: Vec::new(),
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            sink: SinkConfig::default(),
            health: HealthConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.masters.is_empty() {
            return Err(crate::Error::config("no masters configured"));
        }

        for master in &self.masters {
            master.validate()?;
        }
        self.sink.validate()?;
        self.health.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }

    /// Names of the enabled masters, in configuration order
    pub fn enabled_masters(&self) -> Vec<String> {
        self.masters
            .iter()
            .filter(|master| master.enabled)
            .map(|master| master.name.clone())
            .collect()
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One monitored master
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Master identifier, unique across the configuration
    pub name: String,

    /// Base URL of the master's API
    pub url: String,

    /// Whether this master is polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl MasterConfig {
    /// Create a new enabled master configuration
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
        }
    }

    /// Enable or disable the master
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("master name cannot be empty"));
        }
        if self.url.is_empty() {
            return Err(crate::Error::config(format!(
                "master '{}' has an empty URL",
                self.name
            )));
        }
        Ok(())
    }
}

/// Master data-source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Jenkins JSON API source
    #[default]
    Jenkins,

    /// Jenkins JSON API source with basic auth
    JenkinsAuth {
        /// API username
        username: String,
        /// API token
        api_token: String,
    },
}

/// Build cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// File-based cache
    File {
        /// Path to the cache file
        path: String,
    },

    /// In-memory cache (not persistent)
    #[default]
    Memory,
}

/// Event sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Log each event via tracing
    #[default]
    Log,

    /// POST each event as JSON to a URL
    Webhook {
        /// Webhook endpoint
        url: String,
    },
}

impl SinkConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Webhook { url } if url.is_empty() => {
                Err(crate::Error::config("webhook sink URL cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Instance-health oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthConfig {
    /// Fixed status, no external source
    Static {
        /// Whether this instance is in service
        in_service: bool,
    },

    /// GET a status endpoint; 2xx means in service
    Http {
        /// Status endpoint URL
        url: String,
    },
}

impl HealthConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        match self {
            HealthConfig::Http { url } if url.is_empty() => {
                Err(crate::Error::config("health oracle URL cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        // Absence of an oracle fails open
        HealthConfig::Static { in_service: true }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Poll interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("poll interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}
