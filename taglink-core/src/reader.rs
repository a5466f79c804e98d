use crate::device::DeviceDescriptor;
use crate::track::Track;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a scan should be routed to a playback target (§9 open question #1).
///
/// Modeled as an explicit variant rather than inferred from a device-id string convention, so
/// the Orchestrator's device-resolution order (§4.6) can match on a typed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Play from the scanning SD-capable reader's own local storage.
    Local,
    /// Stream from the network cache to whichever device is resolved as the target.
    Stream,
}

/// The track list and provenance captured at the moment a tag is placed on a reader.
///
/// Carries the authoritative track list used by the Reader State Machine before
/// `metadata.json` exists for the fingerprint (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub uid: String,
    pub series: Option<String>,
    pub episode: Option<String>,
    pub title: Option<String>,
    pub picture: Option<String>,
    pub audio_url: String,
    pub playback_url: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub start_position: f64,
    pub duration: f64,
    pub tracks: Vec<Track>,
}

/// What to resume when a tag returns to a reader after removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub uid: String,
    pub position: f64,
    pub device: DeviceDescriptor,
    pub paused: bool,
}

/// Per-reader mutable state (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderState {
    pub current_tag: Option<TagSnapshot>,
    pub current_started_at: Option<DateTime<Utc>>,
    pub current_offset: f64,
    pub last_reported_position: Option<f64>,
    pub current_device: Option<DeviceDescriptor>,
    pub resume: Option<ResumeRecord>,
    pub mode: ScanMode,
    pub target_device: Option<DeviceDescriptor>,
}

impl Default for ReaderState {
    fn default() -> Self {
        ReaderState {
            current_tag: None,
            current_started_at: None,
            current_offset: 0.0,
            last_reported_position: None,
            current_device: None,
            resume: None,
            mode: ScanMode::Stream,
            target_device: None,
        }
    }
}

impl ReaderState {
    pub fn is_playing(&self) -> bool {
        self.current_tag.is_some() && self.resume.as_ref().map(|r| !r.paused).unwrap_or(true)
    }

    pub fn is_paused(&self) -> bool {
        self.current_tag.is_some() && self.resume.as_ref().map(|r| r.paused).unwrap_or(false)
    }
}

/// Directory-style record of a reader seen by the system (§3).
///
/// Readers whose `ip` matches `manual-stream`, `browser-session`, or `web-*` are virtual: they
/// are never persisted and never probed by the Liveness Supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderDescriptor {
    pub ip: String,
    pub name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub scan_count: u64,
    pub online: bool,
}

impl ReaderDescriptor {
    /// Matches the reference implementation's `_is_virtual_reader` predicate exactly.
    pub fn is_virtual(ip: &str) -> bool {
        ip == "manual-stream" || ip == "browser-session" || ip.starts_with("web-")
    }
}
