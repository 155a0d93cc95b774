//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./taskview.toml or ./.taskview/config.toml
//! 2. User config: ~/.taskview/config.toml
//! 3. System config: /etc/taskview/config.toml
//! 4. Built-in defaults

use crate::env;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Remote service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the remote task service API
    pub base_url: String,
    /// Page size requested from the task listing endpoint
    pub page_size: u32,
}

/// Outbound call throttle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum permits outstanding at once
    pub max_concurrent: usize,
    /// Fixed interval after which a granted permit frees itself
    pub interval: Duration,
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age past which a cached response is treated as absent
    pub ttl: Duration,
}

/// Credential lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Fixed interval between background refresh attempts; fires
    /// independently of actual token expiry, which is never parsed
    pub refresh_interval: Duration,
    /// Automation bot whose token endpoint backs the refresh call
    pub refresh_bot: String,
}

/// Unified configuration for a service session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                base_url: "http://localhost:8585/api/v1".to_string(),
                page_size: 50,
            },
            rate_limit: RateLimitConfig {
                max_concurrent: 5,
                interval: Duration::from_secs(1),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(300), // 5 minutes
            },
            auth: AuthConfig {
                refresh_interval: Duration::from_secs(1500), // 25 minutes
                refresh_bot: "ingestion-bot".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return AppConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(AppConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        // 1. Current directory: ./taskview.toml
        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join("taskview.toml"));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        // 2. User config: ~/.taskview/config.toml
        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        // 3. System config: /etc/taskview/config.toml (Unix-like systems)
        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/taskview/config.toml"));

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var_os("HOME").map(PathBuf::from)
    }
}
