// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving session settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SCAN_DURATION, SERVICE_UUID};
use crate::bluetooth::{ConnectionOptions, DiscoveryOptions};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Discovery settings.
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Service UUID to connect to on the peer.
    pub service_uuid: Uuid,

    /// BlueZ adapter name, e.g. "hci0". Default adapter when unset.
    pub adapter: Option<String>,

    /// Stop a running scan before connecting.
    pub cancel_discovery_before_connect: bool,

    /// Upper bound for one connect attempt, in seconds.
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Refresh the paired list whenever a scan starts.
    pub refresh_paired_on_scan: bool,

    /// Refuse to scan without location permission.
    pub require_location_permission: bool,

    /// Scan length for backends without their own limit, in seconds.
    pub scan_duration_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            service_uuid: SERVICE_UUID,
            adapter: None,
            cancel_discovery_before_connect: true,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_paired_on_scan: true,
            require_location_permission: true,
            scan_duration_secs: DEFAULT_SCAN_DURATION.as_secs(),
        }
    }
}

impl BluetoothConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            service_uuid: self.service_uuid,
            cancel_discovery_before_connect: self.cancel_discovery_before_connect,
        }
    }
}

impl DiscoveryConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_duration_secs)
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            refresh_paired_on_scan: self.refresh_paired_on_scan,
            require_location_permission: self.require_location_permission,
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("peerlink")
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("feafaa8c-e0f6-11eb-ba80-0242ac130004"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bluetooth]\nadapter = \"hci1\"\n\n[discovery]\nrefresh_paired_on_scan = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.adapter.as_deref(), Some("hci1"));
        assert_eq!(config.bluetooth.service_uuid, SERVICE_UUID);
        assert!(!config.discovery.refresh_paired_on_scan);
        assert!(config.discovery.require_location_permission);
        assert_eq!(config.discovery.scan_duration(), DEFAULT_SCAN_DURATION);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.bluetooth.connect_timeout_secs = 5;
        config.bluetooth.cancel_discovery_before_connect = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.bluetooth.connect_timeout(), Duration::from_secs(5));
        assert!(!loaded.bluetooth.connection_options().cancel_discovery_before_connect);
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth]\nservice_uuid = \"not-a-uuid\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
