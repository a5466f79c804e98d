use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taglink_core::{DeviceDescriptor, ReaderDescriptor, UploadIntent};

/// Tunables a deployer can change without recompiling (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDocument {
    pub cache_cap_bytes: u64,
    pub upload_rate_kbps_active: u32,
    pub upload_rate_kbps_idle: u32,
    pub content_base_url: String,
    pub http_bind: String,
    pub liveness_period_seconds: u64,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        SettingsDocument {
            cache_cap_bytes: 10 * 1024 * 1024 * 1024,
            upload_rate_kbps_active: 2_000,
            upload_rate_kbps_idle: 500,
            content_base_url: "http://localhost:8080".to_string(),
            http_bind: "0.0.0.0:8765".to_string(),
            liveness_period_seconds: 60,
        }
    }
}

/// User-facing preferences, distinct from [`SettingsDocument`]'s deployment tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesDocument {
    pub default_device: Option<DeviceDescriptor>,
}

/// One cached device record (§3, §4.9): initialized offline on load, refreshed by discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCacheEntry {
    pub descriptor: DeviceDescriptor,
    pub last_seen: DateTime<Utc>,
    pub online: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCacheDocument {
    pub devices: HashMap<String, DeviceCacheEntry>,
}

/// Known readers plus any persisted per-reader device override (§4.6 resolution order).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderCacheDocument {
    pub readers: HashMap<String, ReaderDescriptor>,
    pub overrides: HashMap<String, DeviceDescriptor>,
}

/// One persisted upload intent per device, keyed by device id (§4.5, §4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadQueueDocument {
    pub intents: HashMap<String, UploadIntent>,
}
