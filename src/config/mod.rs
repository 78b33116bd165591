//! # Configuration Management Module
//!
//! TOML configuration for the announce stream, the viewport reconciliation and
//! the peer cache.
//!
//! ## Configuration Structure
//!
//! - [`StreamConfig`] - reachability window, eviction, housekeeping, announce pacing
//! - [`ViewportConfig`] - settle-event suppression after programmatic scrolls
//! - [`StorageConfig`] - peer cache location
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshpeers::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Peer cache: {}", config.storage.peer_cache);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [stream]
//! display_name = "meshpeers"
//! reachable_window_minutes = 30
//! stale_after_hours = 24
//!
//! [viewport]
//! suppress_settle_events = 1
//!
//! [storage]
//! peer_cache = "data/peers.json"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::peers::store::DEFAULT_MAX_PEERS;

/// Upper bound for the settle suppression window; larger values swallow real user scrolls.
pub const MAX_SUPPRESS_SETTLE_EVENTS: u32 = 8;

/// Longest accepted stale window (one year).
pub const MAX_STALE_AFTER_HOURS: u32 = 24 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stream: StreamConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Name carried in our own announces.
    pub display_name: String,
    /// A peer counts as reachable when heard within this many minutes.
    pub reachable_window_minutes: u32,
    /// Peers not heard for this long are evicted during housekeeping (favorites excepted).
    pub stale_after_hours: u32,
    #[serde(default)]
    pub housekeeping_interval_secs: Option<u64>,
    /// Minimum spacing between user-triggered announces.
    #[serde(default)]
    pub announce_min_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_peers: Option<usize>,
    #[serde(default)]
    pub max_query_chars: Option<usize>,
}

impl StreamConfig {
    pub fn reachable_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reachable_window_minutes as i64)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours as i64)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs.unwrap_or(300).max(1))
    }

    pub fn announce_min_interval(&self) -> Duration {
        Duration::from_secs(self.announce_min_interval_secs.unwrap_or(10))
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers.unwrap_or(DEFAULT_MAX_PEERS)
    }

    pub fn max_query_chars(&self) -> usize {
        self.max_query_chars.unwrap_or(64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Settle events ignored after each reconciliation scroll.
    pub suppress_settle_events: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            suppress_settle_events: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub peer_cache: String,
    /// Write the cache back on clean shutdown.
    #[serde(default = "default_save_on_exit")]
    pub save_on_exit: bool,
}

fn default_save_on_exit() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.reachable_window_minutes == 0 {
            bail!("stream.reachable_window_minutes must be greater than 0");
        }
        if self.stream.stale_after_hours == 0 {
            bail!("stream.stale_after_hours must be greater than 0");
        }
        if self.stream.stale_after_hours > MAX_STALE_AFTER_HOURS {
            bail!(
                "stream.stale_after_hours must be at most {}",
                MAX_STALE_AFTER_HOURS
            );
        }
        if self.stream.stale_after() < self.stream.reachable_window() {
            bail!("stream.stale_after_hours must cover the reachable window");
        }
        if self.stream.max_peers() == 0 {
            bail!("stream.max_peers must be greater than 0");
        }
        if self.viewport.suppress_settle_events > MAX_SUPPRESS_SETTLE_EVENTS {
            bail!(
                "viewport.suppress_settle_events must be at most {}",
                MAX_SUPPRESS_SETTLE_EVENTS
            );
        }
        if self.storage.peer_cache.trim().is_empty() {
            bail!("storage.peer_cache must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stream: StreamConfig {
                display_name: "meshpeers".to_string(),
                reachable_window_minutes: 30,
                stale_after_hours: 24,
                housekeeping_interval_secs: Some(300),
                announce_min_interval_secs: Some(10),
                max_peers: Some(DEFAULT_MAX_PEERS),
                max_query_chars: Some(64),
            },
            viewport: ViewportConfig::default(),
            storage: StorageConfig {
                peer_cache: "data/peers.json".to_string(),
                save_on_exit: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("meshpeers.log".to_string()),
            },
        }
    }
}
