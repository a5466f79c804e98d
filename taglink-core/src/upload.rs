use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One track's source/destination pairing within an upload intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTrack {
    pub index: u32,
    pub name: String,
    pub source_path: PathBuf,
    pub dest_path: String,
    #[serde(default)]
    pub duration_seconds: f64,
}

/// Current state of an upload against a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Verifying,
    Complete,
    Failed,
}

/// A persisted intent to mirror an album onto an SD-capable device (§3, §4.5).
///
/// Survives process restarts: on restart or device heartbeat, any intent still `Pending` or
/// `InProgress` triggers a resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadIntent {
    pub uid: String,
    pub series: Option<String>,
    pub episode: Option<String>,
    pub folder_path: String,
    pub audio_url: String,
    pub tracks: Vec<UploadTrack>,
    pub queued_at: DateTime<Utc>,
    pub status: UploadStatus,
}
