use std::collections::HashMap;

use crate::device_client::DeviceFileClient;
use crate::layout::{AlbumIndex, TrackIndexEntry, UidMapEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Ok,
    Missing,
    SizeMismatch,
}

#[derive(Debug, Clone)]
pub struct TrackVerification {
    pub index: u32,
    pub file: String,
    pub status: TrackStatus,
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub folder: String,
    pub total: usize,
    pub verified: usize,
    pub missing: usize,
    pub mismatched: usize,
    pub tracks: Vec<TrackVerification>,
}

impl VerifyReport {
    pub fn complete(&self) -> bool {
        self.missing == 0 && self.mismatched == 0 && self.verified == self.total
    }
}

/// Recovers the expected track index for a folder, preferring `metadata.json` and falling back
/// to the UID map (§4.5 step 1).
pub async fn recover_index(
    client: &DeviceFileClient,
    folder: &str,
    uid_map_path: Option<&str>,
) -> Option<AlbumIndex> {
    let folder_metadata_path = format!("{folder}/metadata.json");
    if let Some(bytes) = client.read(&folder_metadata_path).await {
        if let Ok(index) = serde_json::from_slice::<AlbumIndex>(&bytes) {
            return Some(index);
        }
    }
    let uid_map_path = uid_map_path?;
    let bytes = client.read(uid_map_path).await?;
    let entry: UidMapEntry = serde_json::from_slice(&bytes).ok()?;
    if entry.folder != folder {
        return None;
    }
    Some(index_from_uid_map(entry))
}

/// Rebuilds an [`AlbumIndex`] from a UID map entry's `files` list. The map carries no track
/// duration (the device's own UID map format doesn't record one), so verification — which only
/// ever compares `file`/`size` — is unaffected.
fn index_from_uid_map(entry: UidMapEntry) -> AlbumIndex {
    let tracks = entry
        .files
        .into_iter()
        .map(|f| TrackIndexEntry { index: f.index, name: f.name.clone(), file: f.name, duration: 0.0, size: f.size })
        .collect();
    AlbumIndex { tracks }
}

/// Classifies each expected track as present-and-sized, missing, or size-mismatched against the
/// device's actual directory listing (§4.5 step 2-3).
pub async fn verify(client: &DeviceFileClient, folder: &str, index: &AlbumIndex) -> VerifyReport {
    let listed = client.list(folder).await.unwrap_or_default();
    let actual_sizes: HashMap<String, u64> = listed.into_iter().map(|f| (f.name, f.size)).collect();

    let mut tracks = Vec::with_capacity(index.tracks.len());
    let mut missing = 0;
    let mut mismatched = 0;
    let mut verified = 0;
    for entry in &index.tracks {
        let status = match actual_sizes.get(&entry.file) {
            None => {
                missing += 1;
                TrackStatus::Missing
            }
            Some(&actual_size) if actual_size != entry.size => {
                mismatched += 1;
                TrackStatus::SizeMismatch
            }
            Some(_) => {
                verified += 1;
                TrackStatus::Ok
            }
        };
        tracks.push(TrackVerification { index: entry.index, file: entry.file.clone(), status });
    }

    VerifyReport { folder: folder.to_string(), total: index.tracks.len(), verified, missing, mismatched, tracks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TrackIndexEntry;

    fn sample_index() -> AlbumIndex {
        AlbumIndex {
            tracks: vec![
                TrackIndexEntry { index: 0, name: "one".into(), file: "01_one.mp3".into(), duration: 10.0, size: 100 },
                TrackIndexEntry { index: 1, name: "two".into(), file: "02_two.mp3".into(), duration: 8.0, size: 200 },
            ],
        }
    }

    #[test]
    fn complete_report_has_no_missing_or_mismatched() {
        let report = VerifyReport {
            folder: "x".into(),
            total: 2,
            verified: 2,
            missing: 0,
            mismatched: 0,
            tracks: vec![],
        };
        assert!(report.complete());
    }

    #[test]
    fn incomplete_when_any_missing() {
        let report = VerifyReport {
            folder: "x".into(),
            total: 2,
            verified: 1,
            missing: 1,
            mismatched: 0,
            tracks: vec![],
        };
        assert!(!report.complete());
    }

    #[test]
    fn sample_index_has_two_tracks() {
        assert_eq!(sample_index().tracks.len(), 2);
    }

    #[test]
    fn uid_map_reconstructs_a_usable_index() {
        use crate::layout::UidMapFileEntry;

        let entry = UidMapEntry {
            folder: "Die_drei_Folge_1".into(),
            uid: Some("1316804B".into()),
            files: vec![
                UidMapFileEntry { index: 0, name: "01_one.mp3".into(), size: 100 },
                UidMapFileEntry { index: 1, name: "02_two.mp3".into(), size: 200 },
            ],
        };
        let index = index_from_uid_map(entry);
        assert_eq!(index.tracks.len(), 2);
        assert_eq!(index.tracks[0].file, "01_one.mp3");
        assert_eq!(index.tracks[1].size, 200);
    }
}
