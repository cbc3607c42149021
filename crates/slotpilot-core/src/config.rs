//! SlotPilot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SlotPilotError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SlotPilotConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl SlotPilotConfig {
    /// Load config from the default path (~/.slotpilot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SlotPilotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SlotPilotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SlotPilotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SlotPilot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slotpilot")
    }
}

/// Sports-portal session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the profile page that carries the calendar.
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    /// Path the booking control posts to when a row is opened.
    #[serde(default = "default_checkin_path")]
    pub checkin_path: String,
    /// How long to let the page settle after navigating weeks, in ms.
    #[serde(default = "default_navigate_settle_ms")]
    pub navigate_settle_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://sport.innopolis.university".into()
}
fn default_profile_path() -> String {
    "/profile/".into()
}
fn default_checkin_path() -> String {
    "/api/checkin".into()
}
fn default_navigate_settle_ms() -> u64 {
    1000
}
fn default_http_timeout_secs() -> u64 {
    15
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            profile_path: default_profile_path(),
            checkin_path: default_checkin_path(),
            navigate_settle_ms: default_navigate_settle_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.slotpilot/store.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Booking scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Coarse tick interval — the durability backstop.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Settle delay between opening a row and confirming, in ms.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_tick_secs() -> u64 {
    60
}
fn default_settle_ms() -> u64 {
    500
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// License backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    #[serde(default = "default_license_endpoint")]
    pub endpoint: String,
    /// The license code this installation runs under; empty disables the gate.
    #[serde(default)]
    pub code: String,
    /// Admin shared secret for issuing codes; admin use only.
    #[serde(default)]
    pub admin_key: String,
}

fn default_license_endpoint() -> String {
    "https://api.slotpilot.dev/projects/slotpilot".into()
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_license_endpoint(),
            code: String::new(),
            admin_key: String::new(),
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Optional webhook that receives queue notifications as JSON POSTs.
    #[serde(default)]
    pub webhook_url: String,
}
