use serde::{Deserialize, Serialize};

/// One track within an album, as scheduled for encoding.
///
/// Invariant: within an album, `index` values are contiguous starting at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub index: u32,
    pub name: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl Track {
    /// Filename this track is stored under inside its fingerprint directory: `NN.mp3`.
    pub fn filename(&self) -> String {
        format!("{:02}.mp3", self.index + 1)
    }
}

/// Album-level metadata, written to `metadata.json` only once every track exists.
///
/// The presence of this file is the sole authoritative "fully cached" signal (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub total_duration: f64,
    pub source_url: String,
    pub tracks: Vec<Track>,
}

/// In-memory, per-fingerprint encoding status tracked by the Encoding Coordinator (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EncodingStatus {
    Unknown,
    Encoding {
        progress_percent: u8,
        current_track: u32,
        tracks_completed: u32,
        total_tracks: u32,
        started_at: chrono::DateTime<chrono::Utc>,
    },
    Ready,
    Cached,
    Error {
        message: String,
    },
}

impl EncodingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EncodingStatus::Cached | EncodingStatus::Error { .. })
    }
}
