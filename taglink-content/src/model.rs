use serde::{Deserialize, Serialize};

/// Tonie-style descriptive metadata attached to a resolved tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TonieInfo {
    pub series: Option<String>,
    pub episode: Option<String>,
    pub title: Option<String>,
    pub picture: Option<String>,
    pub model: Option<String>,
}

/// One entry in the upstream content index, keyed by the tag's full or suffix UID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagIndexEntry {
    pub uid: String,
    pub source: Option<String>,
    #[serde(default)]
    pub track_seconds: Vec<f64>,
    #[serde(default)]
    pub tonie_info: TonieInfo,
    pub audio_url: String,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub exists: bool,
}

impl TagIndexEntry {
    /// The tag's overall known duration, carried through `trackSeconds`' last cumulative
    /// timestamp the same way the upstream index itself derives it (`track_seconds[-1]` when
    /// non-empty, `0` otherwise). Used to size a pseudo-track when there's too little boundary
    /// data to build real per-track splits (§8 boundary).
    pub fn known_duration(&self) -> f64 {
        self.track_seconds.last().copied().unwrap_or(0.0)
    }
}
