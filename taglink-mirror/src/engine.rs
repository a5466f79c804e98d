use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use taglink_core::{UploadIntent, UploadStatus, UploadTrack};
use taglink_devices::DeviceRegistry;

use crate::device_client::DeviceFileClient;
use crate::error::MirrorError;
use crate::layout::{
    album_path, track_file_name, uid_map_path, AlbumIndex, TrackIndexEntry, UidMapEntry, UidMapFileEntry,
};
use crate::queue::UploadQueueSink;
use crate::uploader::{upload_with_retry, ProgressSink, UploadOptions};
use crate::verify::{recover_index, verify, VerifyReport};

struct ActiveUpload {
    cancel: Arc<AtomicBool>,
}

/// Mirrors encoded albums onto SD-capable devices so future scans play locally (§4.5).
pub struct MirrorEngine {
    devices: Arc<DeviceRegistry>,
    queue: Arc<dyn UploadQueueSink>,
    active: Mutex<HashMap<String, ActiveUpload>>,
    status: Mutex<HashMap<String, UploadStatus>>,
    suppressed: Mutex<HashSet<String>>,
}

impl MirrorEngine {
    pub fn new(devices: Arc<DeviceRegistry>, queue: Arc<dyn UploadQueueSink>) -> Self {
        MirrorEngine {
            devices,
            queue,
            active: Mutex::new(HashMap::new()),
            status: Mutex::new(HashMap::new()),
            suppressed: Mutex::new(HashSet::new()),
        }
    }

    /// Persists an intent and starts (or resumes) its upload. At most one upload runs per
    /// device (§5); a second `queue_intent` for the same device replaces the running one only
    /// after the first fully returns, since the per-device lock below serializes entry.
    pub async fn queue_intent(&self, device_id: &str, intent: UploadIntent) {
        self.suppressed.lock().await.remove(device_id);
        self.queue.save(device_id, &intent).await;
        self.upload_album(device_id, intent, None).await;
    }

    /// Re-drives any persisted intent for a device — called on process restart and on device
    /// heartbeat (§4.5 "Parallelism & ordering"). No-op if the device was explicitly cancelled
    /// since its intent was last queued.
    pub async fn resume(&self, device_id: &str) {
        if self.suppressed.lock().await.contains(device_id) {
            return;
        }
        let all = self.queue.load_all().await;
        if let Some((_, intent)) = all.into_iter().find(|(id, _)| id == device_id) {
            if matches!(intent.status, UploadStatus::Pending | UploadStatus::InProgress) {
                self.upload_album(device_id, intent, None).await;
            }
        }
    }

    /// Cancels any in-flight transfer for a device, clears its persisted intent, and suppresses
    /// future resumes until a new intent is queued.
    pub async fn cancel(&self, device_id: &str) {
        if let Some(active) = self.active.lock().await.get(device_id) {
            active.cancel.store(true, Ordering::SeqCst);
        }
        self.status.lock().await.insert(device_id.to_string(), UploadStatus::Failed);
        self.queue.clear(device_id).await;
        self.suppressed.lock().await.insert(device_id.to_string());
    }

    pub async fn status_snapshot(&self) -> HashMap<String, UploadStatus> {
        self.status.lock().await.clone()
    }

    /// Every intent still sitting in the persistent queue, pending or in-flight (`GET
    /// /uploads/pending`, §6).
    pub async fn pending_intents(&self) -> Vec<(String, UploadIntent)> {
        self.queue.load_all().await
    }

    /// Cancels every device with a pending or active intent (`DELETE /uploads`, `DELETE
    /// /uploads/pending`, `POST /uploads/wipe`, §6).
    pub async fn cancel_all(&self) {
        let device_ids: Vec<String> = self.queue.load_all().await.into_iter().map(|(id, _)| id).collect();
        for device_id in device_ids {
            self.cancel(&device_id).await;
        }
    }

    /// Resumes every device with a pending intent (`POST /uploads/retry`, §6).
    pub async fn resume_all(&self) {
        let device_ids: Vec<String> = self.queue.load_all().await.into_iter().map(|(id, _)| id).collect();
        for device_id in device_ids {
            self.resume(&device_id).await;
        }
    }

    /// Uploads every track of `intent` to the device, then the album index and UID map, with
    /// an optional progress sink for the caller (the Orchestrator forwards it over SSE).
    pub async fn upload_album(&self, device_id: &str, intent: UploadIntent, progress: Option<ProgressSink>) {
        let cancel = Arc::new(AtomicBool::new(false));
        self.active.lock().await.insert(device_id.to_string(), ActiveUpload { cancel: cancel.clone() });
        self.status.lock().await.insert(device_id.to_string(), UploadStatus::InProgress);

        let result = self.run_upload(device_id, &intent, cancel, progress).await;
        self.active.lock().await.remove(device_id);

        match result {
            Ok(()) => {
                info!(device_id, uid = %intent.uid, "album mirrored successfully");
                self.status.lock().await.insert(device_id.to_string(), UploadStatus::Complete);
                self.queue.clear(device_id).await;
                self.bind_tag(device_id, &intent).await;
            }
            Err(MirrorError::Cancelled { .. }) => {
                info!(device_id, uid = %intent.uid, "album mirror cancelled");
            }
            Err(error) => {
                warn!(device_id, uid = %intent.uid, %error, "album mirror failed");
                self.status.lock().await.insert(device_id.to_string(), UploadStatus::Failed);
            }
        }
    }

    async fn run_upload(
        &self,
        device_id: &str,
        intent: &UploadIntent,
        cancel: Arc<AtomicBool>,
        progress: Option<ProgressSink>,
    ) -> Result<(), MirrorError> {
        let client = DeviceFileClient::new(device_id);
        client.ensure_dir(&intent.folder_path).await;

        let mut index_entries = Vec::with_capacity(intent.tracks.len());
        for track in &intent.tracks {
            let options =
                UploadOptions { rate_limit_bytes_per_sec: None, cancel: cancel.clone(), progress: progress.clone() };
            upload_with_retry(&client, &track.dest_path, &track.source_path, &options).await?;
            let size = tokio::fs::metadata(&track.source_path)
                .await
                .map(|m| m.len())
                .map_err(|source| MirrorError::Io { path: track.source_path.display().to_string(), source })?;
            index_entries.push(TrackIndexEntry {
                index: track.index,
                name: track.name.clone(),
                file: file_name_of(&track.dest_path),
                duration: track.duration_seconds,
                size,
            });
        }

        let index = AlbumIndex { tracks: index_entries };
        let index_bytes = serde_json::to_vec_pretty(&index)
            .map_err(|e| MirrorError::UploadFailed { path: "metadata.json".into(), reason: e.to_string() })?;
        let index_path = format!("{}/metadata.json", intent.folder_path);
        client.upload(&index_path, index_bytes).await?;

        let files: Vec<UidMapFileEntry> = index
            .tracks
            .iter()
            .map(|t| UidMapFileEntry { index: t.index, name: t.file.clone(), size: t.size })
            .collect();
        let uid_entry = UidMapEntry { folder: intent.folder_path.clone(), uid: Some(intent.uid.clone()), files };
        let uid_bytes = serde_json::to_vec_pretty(&uid_entry)
            .map_err(|e| MirrorError::UploadFailed { path: "uid-map".into(), reason: e.to_string() })?;
        client.ensure_dir(crate::layout::uid_map_root()).await;
        client.upload(&uid_map_path(&intent.uid), uid_bytes).await?;

        Ok(())
    }

    /// Binds the tag to its uploaded folder in fixed play-mode once verification says the
    /// mirror is complete (§4.5 final step).
    async fn bind_tag(&self, device_id: &str, intent: &UploadIntent) {
        let sd = self.devices.sd_player(device_id).await;
        sd.bind_tag_folder(&intent.uid, &intent.folder_path).await;
    }

    /// Verifies a folder against its recovered index, repairs any corrupted/missing files by
    /// deleting and re-queueing them, and re-uploads the UID map if it's absent (§4.5 steps 1-4).
    pub async fn verify_folder(&self, device_id: &str, folder: &str, uid: Option<&str>) -> Option<VerifyReport> {
        let client = DeviceFileClient::new(device_id);
        let uid_map = uid.map(|u| uid_map_path(u));
        let index = recover_index(&client, folder, uid_map.as_deref()).await?;
        let report = verify(&client, folder, &index).await;

        for track in &report.tracks {
            if track.status != crate::verify::TrackStatus::Ok {
                let path = format!("{folder}/{}", track.file);
                client.delete(&path).await;
            }
        }

        if report.complete() {
            if let Some(uid) = uid {
                self.devices.sd_player(device_id).await.bind_tag_folder(uid, folder).await;
            }
        }

        Some(report)
    }

    pub fn destination_for(folder: &str) -> String {
        album_path(folder)
    }

    pub fn track_destination(folder: &str, track: &UploadTrack) -> String {
        format!("{}/{}", album_path(folder), track_file_name(track.index, &track.name))
    }
}

fn file_name_of(dest_path: &str) -> String {
    dest_path.rsplit('/').next().unwrap_or(dest_path).to_string()
}
