//! Updater configuration: defaults, optional JSON file, environment overlay.

use ota_utils::http::RetryPolicy;
use ota_utils::props::{get_prop, PROP_BUILD_DATE_UTC, PROP_DEVICE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "https://api.aospextended.com/ota";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value `{value}` for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Where update notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    /// Write the notification to the log
    #[default]
    Log,
    /// Post through the Android `cmd notification` service
    Android,
}

impl std::str::FromStr for NotifierBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "android" => Ok(Self::Android),
            other => Err(format!("unknown notifier backend: {}", other)),
        }
    }
}

/// User-visible notification texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStrings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_update_found")]
    pub update_found: String,
    #[serde(default = "default_update_found_desc")]
    pub update_found_desc: String,
}

fn default_app_name() -> String {
    "Updates".to_string()
}

fn default_update_found() -> String {
    "New updates available".to_string()
}

fn default_update_found_desc() -> String {
    "Tap to view the available builds".to_string()
}

impl Default for NotificationStrings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            update_found: default_update_found(),
            update_found_desc: default_update_found_desc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Update server base, the device name is appended as the last path segment
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Device codename, read from system properties when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Build date of the running system, read from system properties when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_build_date: Option<String>,

    /// Timeout of the first request attempt in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    /// Skip the network interface probe
    #[serde(default)]
    pub assume_online: bool,

    #[serde(default)]
    pub notifier: NotifierBackend,

    /// Uid the Android notification command runs as, the shell user by default
    #[serde(default = "default_notification_uid")]
    pub notification_uid: u32,

    #[serde(default)]
    pub strings: NotificationStrings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_multiplier() -> f32 {
    1.0
}

fn default_notification_uid() -> u32 {
    2000
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            device: None,
            installed_build_date: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_multiplier: default_backoff_multiplier(),
            assume_online: false,
            notifier: NotifierBackend::default(),
            notification_uid: default_notification_uid(),
            strings: NotificationStrings::default(),
        }
    }
}

impl UpdaterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_installed_build_date(mut self, build_date: impl Into<String>) -> Self {
        self.installed_build_date = Some(build_date.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_assume_online(mut self, assume_online: bool) -> Self {
        self.assume_online = assume_online;
        self
    }

    /// Defaults, then `<data_dir>/config.json` when present, then environment.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        Self::load_with(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`UpdaterConfig::load`] with an explicit environment lookup.
    pub fn load_with<F>(data_dir: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_from(lookup)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from environment-style lookups
    ///
    /// Supported variables:
    /// - OTA_BASE_URL
    /// - OTA_DEVICE
    /// - OTA_BUILD_DATE
    /// - OTA_TIMEOUT_MS
    /// - OTA_MAX_RETRIES
    /// - OTA_BACKOFF_MULT
    /// - OTA_ASSUME_ONLINE: "1" / "true"
    /// - OTA_NOTIFIER: "log" or "android"
    /// - OTA_NOTIFY_UID
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("OTA_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(device) = lookup("OTA_DEVICE") {
            self.device = Some(device);
        }
        if let Some(build_date) = lookup("OTA_BUILD_DATE") {
            self.installed_build_date = Some(build_date);
        }
        if let Some(value) = lookup("OTA_TIMEOUT_MS") {
            self.timeout_ms = parse_env("OTA_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("OTA_MAX_RETRIES") {
            self.max_retries = parse_env("OTA_MAX_RETRIES", value)?;
        }
        if let Some(value) = lookup("OTA_BACKOFF_MULT") {
            self.backoff_multiplier = parse_env("OTA_BACKOFF_MULT", value)?;
        }
        if let Some(value) = lookup("OTA_ASSUME_ONLINE") {
            self.assume_online = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(value) = lookup("OTA_NOTIFIER") {
            self.notifier = parse_env("OTA_NOTIFIER", value)?;
        }
        if let Some(value) = lookup("OTA_NOTIFY_UID") {
            self.notification_uid = parse_env("OTA_NOTIFY_UID", value)?;
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.timeout_ms),
            self.max_retries,
            self.backoff_multiplier,
        )
    }

    pub fn resolve_device(&self) -> Option<String> {
        self.device
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| get_prop(PROP_DEVICE))
    }

    pub fn resolve_installed_build_date(&self) -> Option<String> {
        self.installed_build_date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| get_prop(PROP_BUILD_DATE_UTC))
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
