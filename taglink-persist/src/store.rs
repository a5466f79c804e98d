use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use taglink_core::{DeviceDescriptor, ReaderDescriptor, UploadIntent};
use taglink_mirror::UploadQueueSink;

use crate::atomic::{load_or_default, save_atomic};
use crate::documents::{DeviceCacheDocument, DeviceCacheEntry, PreferencesDocument, ReaderCacheDocument, SettingsDocument, UploadQueueDocument};
use crate::env::apply_env_overrides;
use crate::error::PersistError;

/// Owns the five durable documents (§4.9), loaded once at startup and written through on every
/// mutation. No background flush: a setter's `await` doesn't return until the new value is on
/// disk.
pub struct PersistenceStore {
    dir: PathBuf,
    settings: RwLock<SettingsDocument>,
    preferences: RwLock<PreferencesDocument>,
    devices: RwLock<DeviceCacheDocument>,
    readers: RwLock<ReaderCacheDocument>,
    uploads: RwLock<UploadQueueDocument>,
}

impl PersistenceStore {
    /// Loads all five documents from `dir`, creating missing ones with defaults. Device and
    /// reader records are forced offline on load; liveness re-establishes them (§4.9).
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        let mut settings: SettingsDocument = load_or_default(&dir.join("settings.json")).await?;
        apply_env_overrides(&mut settings);
        let preferences = load_or_default(&dir.join("preferences.json")).await?;
        let mut devices: DeviceCacheDocument = load_or_default(&dir.join("devices.json")).await?;
        for entry in devices.devices.values_mut() {
            entry.online = false;
        }
        let mut readers: ReaderCacheDocument = load_or_default(&dir.join("readers.json")).await?;
        for reader in readers.readers.values_mut() {
            reader.online = false;
        }
        let uploads = load_or_default(&dir.join("uploads.json")).await?;

        info!(dir = %dir.display(), "persistence documents loaded");
        Ok(PersistenceStore {
            dir,
            settings: RwLock::new(settings),
            preferences: RwLock::new(preferences),
            devices: RwLock::new(devices),
            readers: RwLock::new(readers),
            uploads: RwLock::new(uploads),
        })
    }

    /// Resolves the default config directory (`$XDG_CONFIG_HOME/taglink` or platform
    /// equivalent), matching the ambient convention of config-path resolution via the `dirs`
    /// crate.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("taglink")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn settings(&self) -> SettingsDocument {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: SettingsDocument) -> Result<(), PersistError> {
        save_atomic(&self.path("settings.json"), &settings).await?;
        *self.settings.write().await = settings;
        Ok(())
    }

    pub async fn preferences(&self) -> PreferencesDocument {
        self.preferences.read().await.clone()
    }

    pub async fn update_preferences(&self, preferences: PreferencesDocument) -> Result<(), PersistError> {
        save_atomic(&self.path("preferences.json"), &preferences).await?;
        *self.preferences.write().await = preferences;
        Ok(())
    }

    pub async fn upsert_device(&self, descriptor: DeviceDescriptor, online: bool) -> Result<(), PersistError> {
        let mut doc = self.devices.write().await;
        doc.devices.insert(
            descriptor.id.clone(),
            DeviceCacheEntry { descriptor, last_seen: Utc::now(), online },
        );
        save_atomic(&self.path("devices.json"), &*doc).await
    }

    pub async fn devices(&self) -> DeviceCacheDocument {
        self.devices.read().await.clone()
    }

    /// Upserts a reader's directory record and bumps `scan_count` (§4.8 step 1). Virtual
    /// readers are never persisted.
    pub async fn upsert_reader(&self, ip: &str, name: Option<String>) -> Result<(), PersistError> {
        if ReaderDescriptor::is_virtual(ip) {
            return Ok(());
        }
        let mut doc = self.readers.write().await;
        let now = Utc::now();
        doc.readers
            .entry(ip.to_string())
            .and_modify(|r| {
                r.last_seen = now;
                r.scan_count += 1;
                r.online = true;
                if name.is_some() {
                    r.name = name.clone();
                }
            })
            .or_insert_with(|| ReaderDescriptor {
                ip: ip.to_string(),
                name: name.clone(),
                first_seen: now,
                last_seen: now,
                scan_count: 1,
                online: true,
            });
        save_atomic(&self.path("readers.json"), &*doc).await
    }

    pub async fn set_reader_override(&self, ip: &str, device: Option<DeviceDescriptor>) -> Result<(), PersistError> {
        let mut doc = self.readers.write().await;
        match device {
            Some(d) => doc.overrides.insert(ip.to_string(), d),
            None => doc.overrides.remove(ip),
        };
        save_atomic(&self.path("readers.json"), &*doc).await
    }

    pub async fn readers(&self) -> ReaderCacheDocument {
        self.readers.read().await.clone()
    }

    pub async fn uploads(&self) -> UploadQueueDocument {
        self.uploads.read().await.clone()
    }
}

#[async_trait]
impl UploadQueueSink for PersistenceStore {
    async fn save(&self, device_id: &str, intent: &UploadIntent) {
        let mut doc = self.uploads.write().await;
        doc.intents.insert(device_id.to_string(), intent.clone());
        let _ = save_atomic(&self.path("uploads.json"), &*doc).await;
    }

    async fn clear(&self, device_id: &str) {
        let mut doc = self.uploads.write().await;
        doc.intents.remove(device_id);
        let _ = save_atomic(&self.path("uploads.json"), &*doc).await;
    }

    async fn load_all(&self) -> Vec<(String, UploadIntent)> {
        self.uploads.read().await.intents.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_defaults_when_no_files_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        assert_eq!(store.settings().await.cache_cap_bytes, SettingsDocument::default().cache_cap_bytes);
    }

    #[tokio::test]
    async fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        let mut settings = store.settings().await;
        settings.cache_cap_bytes = 999;
        store.update_settings(settings).await.unwrap();

        let reloaded = PersistenceStore::load(dir.path()).await.unwrap();
        assert_eq!(reloaded.settings().await.cache_cap_bytes, 999);
    }

    #[tokio::test]
    async fn upserting_a_reader_bumps_scan_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        store.upsert_reader("192.168.1.5", Some("kitchen".into())).await.unwrap();
        store.upsert_reader("192.168.1.5", None).await.unwrap();
        let readers = store.readers().await;
        assert_eq!(readers.readers["192.168.1.5"].scan_count, 2);
    }

    #[tokio::test]
    async fn virtual_readers_are_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        store.upsert_reader("browser-session", None).await.unwrap();
        assert!(store.readers().await.readers.is_empty());
    }

    #[tokio::test]
    async fn devices_are_forced_offline_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        let descriptor = DeviceDescriptor::new(taglink_core::DeviceKind::Cast, "living-room");
        store.upsert_device(descriptor, true).await.unwrap();

        let reloaded = PersistenceStore::load(dir.path()).await.unwrap();
        assert!(!reloaded.devices().await.devices["living-room"].online);
    }

    #[tokio::test]
    async fn upload_queue_sink_round_trips() {
        use taglink_core::UploadStatus;
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::load(dir.path()).await.unwrap();
        let intent = UploadIntent {
            uid: "AABBCCDD".into(),
            series: None,
            episode: None,
            folder_path: "/teddycloud/x".into(),
            audio_url: "https://content.example/a".into(),
            tracks: vec![],
            queued_at: Utc::now(),
            status: UploadStatus::Pending,
        };
        store.save("sd-1", &intent).await;
        assert_eq!(store.load_all().await.len(), 1);
        store.clear("sd-1").await;
        assert!(store.load_all().await.is_empty());
    }
}
