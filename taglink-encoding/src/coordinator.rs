use crate::error::EncodingError;
use crate::progress::ProgressSink;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use taglink_cache::CacheStore;
use taglink_core::{AlbumMetadata, EncodingStatus, Fingerprint, Track};
use taglink_transcode::TrackTags;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// Per-album tags applied to every track's ID3 metadata plus the source the tracks came from.
#[derive(Debug, Clone)]
pub struct AlbumTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub source_url: String,
}

/// Notified once each track in the "remaining" phase is encoded, so the caller can queue it
/// onto a playback device as it becomes available (§4.3, §4.8 step 6).
pub trait QueueSink: Send + Sync {
    fn on_track_ready(&self, fingerprint: &Fingerprint, index: u32, path: &Path);
}

type LockMap = StdMutex<HashMap<Fingerprint, Arc<AsyncMutex<()>>>>;

/// Deduplicates concurrent encode requests per fingerprint and tracks in-memory status (§4.3).
pub struct EncodingCoordinator {
    cache: Arc<CacheStore>,
    first_locks: LockMap,
    remaining_locks: LockMap,
    status: StdMutex<HashMap<Fingerprint, EncodingStatus>>,
}

const STALL_BUDGET: std::time::Duration = std::time::Duration::from_secs(10 * 60);

impl EncodingCoordinator {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        EncodingCoordinator {
            cache,
            first_locks: StdMutex::new(HashMap::new()),
            remaining_locks: StdMutex::new(HashMap::new()),
            status: StdMutex::new(HashMap::new()),
        }
    }

    pub fn status(&self, fp: &Fingerprint) -> EncodingStatus {
        self.status
            .lock()
            .unwrap()
            .get(fp)
            .cloned()
            .unwrap_or(EncodingStatus::Unknown)
    }

    pub fn clear(&self, fp: &Fingerprint) {
        self.status.lock().unwrap().remove(fp);
    }

    fn set_status(&self, fp: &Fingerprint, status: EncodingStatus) {
        self.status.lock().unwrap().insert(fp.clone(), status);
    }

    fn lock_for(map: &LockMap, fp: &Fingerprint) -> Arc<AsyncMutex<()>> {
        map.lock().unwrap().entry(fp.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Encodes only the first track, blocking callers on the latency-critical path. If a
    /// concurrent caller already produced it, returns its path without re-encoding (§4.3).
    pub async fn encode_first_track(
        &self,
        fp: &Fingerprint,
        tracks: &[Track],
        album: &AlbumTags,
        cover_url: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, EncodingError> {
        let track = tracks.first().ok_or(EncodingError::EmptyAlbum)?;
        let lock = Self::lock_for(&self.first_locks, fp);
        let _guard = lock.lock().await;

        let out_path = self.cache.track_path(fp, track.index);
        if tokio::fs::try_exists(&out_path).await.unwrap_or(false) {
            return Ok(out_path);
        }

        self.cache.ensure_dir(fp).await?;
        self.cache
            .ensure_space((track.duration_seconds * 24_000.0) as u64, &[fp.clone()])
            .await
            .ok();

        self.set_status(
            fp,
            EncodingStatus::Encoding {
                progress_percent: 0,
                current_track: track.index,
                tracks_completed: 0,
                total_tracks: tracks.len() as u32,
                started_at: Utc::now(),
            },
        );

        let cover_path = match cover_url {
            Some(url) => taglink_cache::fetch_cover(&self.cache, fp, url).await.ok().flatten(),
            None => None,
        };

        let tags = TrackTags {
            title: track.name.clone(),
            artist: album.artist.clone(),
            album: album.album.clone(),
            track_number: track.index + 1,
            total_tracks: tracks.len() as u32,
            year: album.year,
        };

        taglink_transcode::encode_track(
            &album.source_url,
            track.start_seconds,
            track.duration_seconds,
            &out_path,
            &tags,
            cover_path.as_deref(),
        )
        .await
        .inspect_err(|e| {
            warn!(fingerprint = %fp, error = %e, "first track encode failed");
            self.set_status(fp, EncodingStatus::Error { message: e.to_string() });
        })?;

        let percent = (100 / tracks.len().max(1)) as u8;
        progress.on_progress(fp, percent);
        self.set_status(
            fp,
            EncodingStatus::Encoding {
                progress_percent: percent,
                current_track: track.index,
                tracks_completed: 1,
                total_tracks: tracks.len() as u32,
                started_at: Utc::now(),
            },
        );

        Ok(out_path)
    }

    /// Encodes tracks 1..N, writing `metadata.json` once all exist and transitioning status to
    /// `ready` then `cached`. Intended to be driven from a background task by the caller; a
    /// second concurrent call for the same fingerprint waits on the remaining-phase lock and
    /// then observes the already-written metadata rather than re-encoding (§4.3).
    pub async fn encode_remaining(
        &self,
        fp: &Fingerprint,
        tracks: &[Track],
        album: &AlbumTags,
        cover_url: Option<&str>,
        progress: &dyn ProgressSink,
        queue: Option<&dyn QueueSink>,
    ) -> Result<AlbumMetadata, EncodingError> {
        let lock = Self::lock_for(&self.remaining_locks, fp);
        let _guard = lock.lock().await;

        if self.cache.has_metadata(fp).await {
            return self.read_metadata(fp).await;
        }

        let cover_path = match cover_url {
            Some(url) => taglink_cache::fetch_cover(&self.cache, fp, url).await.ok().flatten(),
            None => None,
        };

        let total = tracks.len() as u32;
        let mut completed: u32 = if tokio::fs::try_exists(self.cache.track_path(fp, 0)).await.unwrap_or(false) {
            1
        } else {
            0
        };

        for track in tracks.iter().skip(1) {
            let out_path = self.cache.track_path(fp, track.index);
            if !tokio::fs::try_exists(&out_path).await.unwrap_or(false) {
                self.cache
                    .ensure_space((track.duration_seconds * 24_000.0) as u64, &[fp.clone()])
                    .await
                    .ok();

                let tags = TrackTags {
                    title: track.name.clone(),
                    artist: album.artist.clone(),
                    album: album.album.clone(),
                    track_number: track.index + 1,
                    total_tracks: total,
                    year: album.year,
                };

                if let Err(e) = taglink_transcode::encode_track(
                    &album.source_url,
                    track.start_seconds,
                    track.duration_seconds,
                    &out_path,
                    &tags,
                    cover_path.as_deref(),
                )
                .await
                {
                    warn!(fingerprint = %fp, track = track.index, error = %e, "track encode failed");
                    self.set_status(fp, EncodingStatus::Error { message: e.to_string() });
                    return Err(e.into());
                }
            }

            completed += 1;
            let percent = ((completed as f64 / total as f64) * 100.0) as u8;
            progress.on_progress(fp, percent);
            if let Some(q) = queue {
                q.on_track_ready(fp, track.index, &out_path);
            }
            self.set_status(
                fp,
                EncodingStatus::Encoding {
                    progress_percent: percent,
                    current_track: track.index,
                    tracks_completed: completed,
                    total_tracks: total,
                    started_at: Utc::now(),
                },
            );
        }

        let metadata = AlbumMetadata {
            title: album.title.clone(),
            artist: album.artist.clone(),
            album: album.album.clone(),
            year: album.year,
            total_duration: tracks.iter().map(|t| t.duration_seconds).sum(),
            source_url: album.source_url.clone(),
            tracks: tracks.to_vec(),
        };

        let json = serde_json::to_vec_pretty(&metadata)?;
        let meta_path = self.cache.metadata_path(fp);
        let tmp_path = meta_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await.map_err(|source| {
            taglink_cache::CacheError::Io { path: tmp_path.clone(), source }
        })?;
        tokio::fs::rename(&tmp_path, &meta_path).await.map_err(|source| {
            taglink_cache::CacheError::Io { path: meta_path.clone(), source }
        })?;

        self.set_status(fp, EncodingStatus::Ready);
        info!(fingerprint = %fp, "album fully encoded");
        self.set_status(fp, EncodingStatus::Cached);
        Ok(metadata)
    }

    /// Sequential convenience combining both phases, for callers outside the progressive
    /// playback path (e.g. the single-file legacy transcode endpoint, §6).
    pub async fn get_or_encode_all(
        &self,
        fp: &Fingerprint,
        tracks: &[Track],
        album: &AlbumTags,
        cover_url: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<AlbumMetadata, EncodingError> {
        if self.cache.has_metadata(fp).await {
            return self.read_metadata(fp).await;
        }
        self.encode_first_track(fp, tracks, album, cover_url, progress).await?;
        self.encode_remaining(fp, tracks, album, cover_url, progress, None).await
    }

    /// True once the first track exists on disk, independent of overall album completion.
    /// Ports `is_first_track_ready`.
    pub async fn is_first_track_ready(&self, fp: &Fingerprint) -> bool {
        tokio::fs::try_exists(self.cache.track_path(fp, 0)).await.unwrap_or(false)
    }

    async fn read_metadata(&self, fp: &Fingerprint) -> Result<AlbumMetadata, EncodingError> {
        let path = self.cache.metadata_path(fp);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| taglink_cache::CacheError::Io { path: path.clone(), source })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Flags an in-flight encode as stalled if its status hasn't advanced within the stall
    /// budget. Intended to be polled periodically by the orchestrator.
    pub fn reap_stalled(&self) {
        let mut status = self.status.lock().unwrap();
        let now = Utc::now();
        for (fp, s) in status.iter_mut() {
            if let EncodingStatus::Encoding { started_at, .. } = s {
                let elapsed = now.signed_duration_since(*started_at).to_std().unwrap_or_default();
                if elapsed > STALL_BUDGET {
                    warn!(fingerprint = %fp, "encoding stalled, marking error");
                    *s = EncodingStatus::Error { message: "stalled".into() };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tracks() -> Vec<Track> {
        vec![
            Track { index: 0, name: "one".into(), start_seconds: 0.0, duration_seconds: 1.0 },
            Track { index: 1, name: "two".into(), start_seconds: 1.0, duration_seconds: 1.0 },
        ]
    }

    #[tokio::test]
    async fn status_starts_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::new(dir.path(), 10_000_000));
        let coord = EncodingCoordinator::new(cache);
        let fp = Fingerprint::of_url("https://content.example/a");
        assert!(matches!(coord.status(&fp), EncodingStatus::Unknown));
    }

    #[tokio::test]
    async fn is_first_track_ready_false_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::new(dir.path(), 10_000_000));
        let coord = EncodingCoordinator::new(cache);
        let fp = Fingerprint::of_url("https://content.example/a");
        assert!(!coord.is_first_track_ready(&fp).await);
    }

    #[tokio::test]
    async fn encode_remaining_short_circuits_when_metadata_present() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::new(dir.path(), 10_000_000));
        let coord = EncodingCoordinator::new(cache.clone());
        let fp = Fingerprint::of_url("https://content.example/a");
        let tracks = sample_tracks();
        let album = AlbumTags {
            title: "t".into(),
            artist: "a".into(),
            album: "al".into(),
            year: None,
            source_url: "https://content.example/a".into(),
        };
        cache.ensure_dir(&fp).await.unwrap();
        let metadata = AlbumMetadata {
            title: album.title.clone(),
            artist: album.artist.clone(),
            album: album.album.clone(),
            year: None,
            total_duration: 2.0,
            source_url: album.source_url.clone(),
            tracks: tracks.clone(),
        };
        tokio::fs::write(cache.metadata_path(&fp), serde_json::to_vec(&metadata).unwrap())
            .await
            .unwrap();

        let sink = crate::progress::NullProgressSink;
        let result = coord.encode_remaining(&fp, &tracks, &album, None, &sink, None).await.unwrap();
        assert_eq!(result.tracks.len(), 2);
    }
}
