use crate::error::CacheError;
use std::path::{Path, PathBuf};
use taglink_core::Fingerprint;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Aggregate cache occupancy, as reported by the `/streams` diagnostics view.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub fingerprint_count: usize,
    pub total_bytes: u64,
    pub cap_bytes: u64,
}

/// Content-addressed cache of encoded albums, one directory per [`Fingerprint`] (§4.1).
///
/// The only writers of a fingerprint directory are the Encoding Coordinator (via the
/// Transcoder) and this store's own eviction/concat operations.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    cap_bytes: u64,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, cap_bytes: u64) -> Self {
        CacheStore { root: root.into(), cap_bytes }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fingerprint_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(fp.as_str())
    }

    pub fn track_path(&self, fp: &Fingerprint, index: u32) -> PathBuf {
        self.fingerprint_dir(fp).join(format!("{:02}.mp3", index + 1))
    }

    pub fn metadata_path(&self, fp: &Fingerprint) -> PathBuf {
        self.fingerprint_dir(fp).join("metadata.json")
    }

    pub fn full_path(&self, fp: &Fingerprint) -> PathBuf {
        self.fingerprint_dir(fp).join("full.mp3")
    }

    pub fn cover_path(&self, fp: &Fingerprint, ext: &str) -> PathBuf {
        self.fingerprint_dir(fp).join(format!("cover.{ext}"))
    }

    pub async fn ensure_dir(&self, fp: &Fingerprint) -> Result<PathBuf, CacheError> {
        let dir = self.fingerprint_dir(fp);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::Io { path: dir.clone(), source })?;
        Ok(dir)
    }

    pub async fn has_metadata(&self, fp: &Fingerprint) -> bool {
        tokio::fs::try_exists(self.metadata_path(fp)).await.unwrap_or(false)
    }

    /// Lists existing track files under a fingerprint directory, in index order.
    /// Does not require `metadata.json` to be present — used by the `partial` status read.
    pub async fn list_tracks(&self, fp: &Fingerprint) -> Result<Vec<PathBuf>, CacheError> {
        let dir = self.fingerprint_dir(fp);
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(source) => return Err(CacheError::Io { path: dir, source }),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CacheError::Io { path: dir.clone(), source })?
        {
            let path = entry.path();
            let is_track = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".mp3") && n != "full.mp3")
                .unwrap_or(false);
            if is_track {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Aggregate size of all cached fingerprint directories, in bytes.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats { cap_bytes: self.cap_bytes, ..Default::default() };
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(source) => return Err(CacheError::Io { path: self.root.clone(), source }),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CacheError::Io { path: self.root.clone(), source })?
        {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                stats.fingerprint_count += 1;
                stats.total_bytes += dir_size(&entry.path()).await;
            }
        }
        Ok(stats)
    }

    /// Ensures at least `bytes` of headroom under the cache cap, evicting whole fingerprint
    /// directories oldest-atime-first (the minimum mtime among a directory's track files),
    /// matching the reference implementation's `ensure_cache_space`. Directories pinned by an
    /// in-flight encode (passed in `protected`) are never evicted.
    pub async fn ensure_space(
        &self,
        bytes: u64,
        protected: &[Fingerprint],
    ) -> Result<(), CacheError> {
        let stats = self.stats().await?;
        if stats.total_bytes + bytes <= self.cap_bytes {
            return Ok(());
        }

        let mut candidates = self.fingerprint_ages().await?;
        candidates.retain(|(fp, _, _)| !protected.contains(fp));
        candidates.sort_by_key(|(_, atime, _)| *atime);

        let mut freed = 0u64;
        let mut current = stats.total_bytes;
        for (fp, _atime, size) in candidates {
            if current + bytes <= self.cap_bytes {
                break;
            }
            let dir = self.fingerprint_dir(&fp);
            info!(fingerprint = %fp, bytes = size, "evicting cache entry to free space");
            if tokio::fs::remove_dir_all(&dir).await.is_ok() {
                current = current.saturating_sub(size);
                freed += size;
            }
        }

        if current + bytes > self.cap_bytes {
            warn!(requested = bytes, freed, "could not evict enough cache to satisfy request");
            return Err(CacheError::InsufficientSpace { requested_bytes: bytes, freed_bytes: freed });
        }
        Ok(())
    }

    async fn fingerprint_ages(&self) -> Result<Vec<(Fingerprint, std::time::SystemTime, u64)>, CacheError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(source) => return Err(CacheError::Io { path: self.root.clone(), source }),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CacheError::Io { path: self.root.clone(), source })?
        {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let fp = Fingerprint::from_existing(name);
            let (atime, size) = oldest_track_atime_and_total_size(&entry.path()).await;
            out.push((fp, atime, size));
        }
        Ok(out)
    }

    /// Removes an entire fingerprint's cache entry unconditionally.
    pub async fn clear(&self, fp: &Fingerprint) -> Result<(), CacheError> {
        let dir = self.fingerprint_dir(fp);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path: dir, source }),
        }
    }

    /// Clears the entire cache root. Used by the `/uploads/wipe`-adjacent maintenance route.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(CacheError::Io { path: self.root.clone(), source }),
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| CacheError::Io { path: self.root.clone(), source })
    }

    /// Concatenates all tracks of a fully-cached fingerprint into `full.mp3` via the external
    /// tool's stream-copy concat demuxer, without re-encoding (§4.1, §4.2).
    pub async fn concat(&self, fp: &Fingerprint) -> Result<PathBuf, CacheError> {
        let out = self.full_path(fp);
        if tokio::fs::try_exists(&out).await.unwrap_or(false) {
            return Ok(out);
        }
        let tracks = self.list_tracks(fp).await?;
        if tracks.is_empty() {
            return Err(CacheError::MetadataMissing(fp.as_str().to_string()));
        }
        if tracks.len() == 1 {
            tokio::fs::copy(&tracks[0], &out)
                .await
                .map_err(|source| CacheError::Io { path: out.clone(), source })?;
            return Ok(out);
        }

        let list_path = self.fingerprint_dir(fp).join(".concat_list.txt");
        let list_body = tracks
            .iter()
            .map(|p| format!("file '{}'", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&list_path, list_body)
            .await
            .map_err(|source| CacheError::Io { path: list_path.clone(), source })?;

        debug!(fingerprint = %fp, "concatenating tracks via ffmpeg concat demuxer");
        let status = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "warning",
                "-y",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
            ])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&out)
            .status()
            .await
            .map_err(|source| CacheError::Io { path: out.clone(), source })?;

        let _ = tokio::fs::remove_file(&list_path).await;

        if !status.success() {
            return Err(CacheError::CoverFetch("ffmpeg concat failed".into()));
        }
        Ok(out)
    }
}

async fn dir_size(dir: &Path) -> u64 {
    let mut total = 0u64;
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                total += meta.len();
            }
        }
    }
    total
}

async fn oldest_track_atime_and_total_size(dir: &Path) -> (std::time::SystemTime, u64) {
    let mut oldest = std::time::SystemTime::now();
    let mut total = 0u64;
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".mp3") {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                total += meta.len();
                if let Ok(accessed) = meta.accessed().or_else(|_| meta.modified()) {
                    if accessed < oldest {
                        oldest = accessed;
                    }
                }
            }
        }
    }
    (oldest, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taglink_core::Fingerprint;

    #[tokio::test]
    async fn track_and_metadata_paths_are_namespaced_by_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 1024 * 1024);
        let fp = Fingerprint::of_url("https://content.example/a");
        assert!(store.track_path(&fp, 0).ends_with("01.mp3"));
        assert!(store.metadata_path(&fp).ends_with("metadata.json"));
    }

    #[tokio::test]
    async fn has_metadata_false_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 1024 * 1024);
        let fp = Fingerprint::of_url("https://content.example/a");
        store.ensure_dir(&fp).await.unwrap();
        assert!(!store.has_metadata(&fp).await);
        tokio::fs::write(store.metadata_path(&fp), "{}").await.unwrap();
        assert!(store.has_metadata(&fp).await);
    }

    #[tokio::test]
    async fn clear_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 1024 * 1024);
        let fp = Fingerprint::of_url("https://content.example/a");
        let fdir = store.ensure_dir(&fp).await.unwrap();
        assert!(tokio::fs::try_exists(&fdir).await.unwrap());
        store.clear(&fp).await.unwrap();
        assert!(!tokio::fs::try_exists(&fdir).await.unwrap());
    }

    #[tokio::test]
    async fn stats_sums_directory_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 1024 * 1024);
        let fp = Fingerprint::of_url("https://content.example/a");
        store.ensure_dir(&fp).await.unwrap();
        tokio::fs::write(store.track_path(&fp, 0), vec![0u8; 128]).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.fingerprint_count, 1);
        assert_eq!(stats.total_bytes, 128);
    }
}
