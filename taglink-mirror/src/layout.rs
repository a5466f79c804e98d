use serde::{Deserialize, Serialize};

use crate::sanitize::sanitize_component;

const FOLDER_NAME_MAX_LEN: usize = 50;
const TRACK_NAME_MAX_LEN: usize = 40;

/// Entry within an uploaded album's `metadata.json` index (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackIndexEntry {
    pub index: u32,
    pub name: String,
    pub file: String,
    pub duration: f64,
    pub size: u64,
}

/// The index file written alongside an uploaded album's track files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumIndex {
    pub tracks: Vec<TrackIndexEntry>,
}

/// One file listed in the sibling UID map (§4.5), mirroring the device's own `files: [{index,
/// name, size}, ...]` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UidMapFileEntry {
    pub index: u32,
    pub name: String,
    pub size: u64,
}

/// The sibling UID map (§4.5): maps a 4-byte tag suffix to the album folder and its uploaded
/// files, so `verify` can recover an index without `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UidMapEntry {
    pub folder: String,
    #[serde(default)]
    pub uid: Option<String>,
    pub files: Vec<UidMapFileEntry>,
}

/// Sanitizes `series`/`episode` into one destination folder component.
pub fn album_folder_name(series: Option<&str>, episode: Option<&str>) -> String {
    let combined = match (series, episode) {
        (Some(series), Some(episode)) => format!("{series} {episode}"),
        (Some(series), None) => series.to_string(),
        (None, Some(episode)) => episode.to_string(),
        (None, None) => "unknown".to_string(),
    };
    sanitize_component(&combined, FOLDER_NAME_MAX_LEN)
}

/// Sanitizes a track name into the `NN_{name}.mp3` destination filename.
pub fn track_file_name(index: u32, name: &str) -> String {
    format!("{:02}_{}.mp3", index + 1, sanitize_component(name, TRACK_NAME_MAX_LEN))
}

/// The last 4 bytes (8 hex digits) of a UID, uppercased, as used for both content-port lookup
/// and the device's UID map filename (§4.5, §6).
pub fn uid_suffix(uid: &str) -> String {
    let hex: String = uid.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    let upper = hex.to_uppercase();
    if upper.len() <= 8 {
        upper
    } else {
        upper[upper.len() - 8..].to_string()
    }
}

pub fn album_root() -> &'static str {
    "/teddycloud"
}

pub fn uid_map_root() -> &'static str {
    "/teddycloud/uids"
}

pub fn album_path(folder: &str) -> String {
    format!("{}/{}", album_root(), folder)
}

pub fn uid_map_path(uid: &str) -> String {
    format!("{}/{}.json", uid_map_root(), uid_suffix(uid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_combines_series_and_episode() {
        assert_eq!(album_folder_name(Some("Die drei ???"), Some("Folge 1")), "Die_drei_Folge_1");
    }

    #[test]
    fn track_file_name_pads_index() {
        assert_eq!(track_file_name(0, "Intro"), "01_Intro.mp3");
        assert_eq!(track_file_name(9, "Outro"), "10_Outro.mp3");
    }

    #[test]
    fn uid_suffix_takes_last_eight_hex_digits() {
        assert_eq!(uid_suffix("0403a1b2c3d4e5f6"), "C3D4E5F6");
    }
}
