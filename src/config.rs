//! Engine configuration.
//!
//! Per-resource TTLs live here, on the caller side of the engine boundary:
//! the tracker and orchestrator never assume a default. Stored as JSON at
//! `~/.config/gradecache/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::key::ResourceKind;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gradecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// TTL in minutes for message lists. Messages move fast.
    pub messages_ttl_minutes: i64,
    /// TTL in minutes for grades, timetable and the other per-student
    /// collections.
    pub default_ttl_minutes: i64,
    /// TTL in minutes for semester/teacher metadata, which changes rarely.
    pub metadata_ttl_minutes: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            messages_ttl_minutes: 30,
            default_ttl_minutes: 60,
            metadata_ttl_minutes: 24 * 60,
        }
    }
}

impl SyncConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// TTL for one resource kind.
    pub fn ttl(&self, kind: ResourceKind) -> Duration {
        let minutes = match kind {
            ResourceKind::Messages | ResourceKind::Mailboxes => self.messages_ttl_minutes,
            ResourceKind::Semesters | ResourceKind::Teachers | ResourceKind::MobileDevices => {
                self.metadata_ttl_minutes
            }
            _ => self.default_ttl_minutes,
        };
        Duration::minutes(minutes)
    }
}
