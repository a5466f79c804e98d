use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taglink_core::{DeviceDescriptor, ScanMode, Track};

/// One scan event as reported by a reader (§4.8, §6 `POST /tonie`).
///
/// `uid: None` means the tag was lifted off the reader. `tracks`/`audio_url` let a caller
/// (legacy clients, manual streaming) bypass the content port entirely and describe the album
/// directly; they win over whatever the content port would have resolved.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub reader_ip: String,
    pub reader_is_sd_player: bool,
    pub uid: Option<String>,
    pub mode: ScanMode,
    pub target_device: Option<DeviceDescriptor>,
    pub title: Option<String>,
    pub series: Option<String>,
    pub episode: Option<String>,
    pub picture: Option<String>,
    pub tracks: Option<Vec<Track>>,
    pub audio_url: Option<String>,
}

/// Remote-control actions routed through a reader's currently resolved device (§6 `POST
/// /control`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
    Stop,
    Skip,
    Prev,
    VolumeUp,
    VolumeDown,
}

/// Response shape returned to a reader after a scan (§4.8 "Return to the reader").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResponse {
    pub uid: Option<String>,
    pub series: Option<String>,
    pub episode: Option<String>,
    pub title: Option<String>,
    pub picture: Option<String>,
    pub found: bool,
    pub playback_started: bool,
    pub encoding: bool,
    pub playback_url: Option<String>,
    pub playlist_url: Option<String>,
    pub track_count: u32,
    pub target: Option<DeviceDescriptor>,
}

/// One entry in the bounded recent-scan history (§4.8 step 8).
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub reader_ip: String,
    pub uid: Option<String>,
    pub target: Option<DeviceDescriptor>,
    pub at: DateTime<Utc>,
}
