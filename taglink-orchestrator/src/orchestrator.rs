use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use taglink_cache::CacheStore;
use taglink_content::ContentPort;
use taglink_core::{
    AlbumMetadata, DeviceDescriptor, DeviceKind, Fingerprint, ReaderDescriptor, ScanMode,
    TagSnapshot, Track, UploadIntent, UploadStatus, UploadTrack,
};
use taglink_devices::{DeviceAdapter, DeviceRegistry};
use taglink_encoding::{AlbumTags, EncodingCoordinator, NullProgressSink, ProgressSink};
use taglink_liveness::LivenessSupervisor;
use taglink_mirror::{uid_suffix, MirrorEngine};
use taglink_persist::PersistenceStore;
use taglink_readers::{ReaderStateMachine, ScanOutcome};

use crate::progress_bridge::SdProgressBridge;
use crate::queue_bridge::DeviceQueueBridge;
use crate::types::{ControlAction, ScanRecord, ScanRequest, ScanResponse};

/// The longest a pseudo-track may run when the content port supplies no boundaries for a tag
/// (§4.8 step 2, §8 boundary: "synthesizes exactly one pseudo-track of duration min(known, 7200)").
const SAFE_MAX_DURATION_SECONDS: f64 = 7200.0;

/// Most recent scans kept for the `/streams` diagnostics view (§4.8 step 8).
const RECENT_SCAN_CAPACITY: usize = 50;

/// Wires a tag scan end to end (§4.8): content resolution, cache/encode, device playback, and
/// SD mirroring, plus the bounded recent-scan log every stage's status is read from.
pub struct Orchestrator {
    cache: Arc<CacheStore>,
    encoding: Arc<EncodingCoordinator>,
    content: Arc<dyn ContentPort>,
    devices: Arc<DeviceRegistry>,
    readers: Arc<ReaderStateMachine>,
    liveness: Arc<LivenessSupervisor>,
    mirror: Arc<MirrorEngine>,
    persist: Arc<PersistenceStore>,
    base_url: String,
    recent_scans: AsyncMutex<VecDeque<ScanRecord>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<CacheStore>,
        encoding: Arc<EncodingCoordinator>,
        content: Arc<dyn ContentPort>,
        devices: Arc<DeviceRegistry>,
        readers: Arc<ReaderStateMachine>,
        liveness: Arc<LivenessSupervisor>,
        mirror: Arc<MirrorEngine>,
        persist: Arc<PersistenceStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Orchestrator {
            cache,
            encoding,
            content,
            devices,
            readers,
            liveness,
            mirror,
            persist,
            base_url: base_url.into(),
            recent_scans: AsyncMutex::new(VecDeque::with_capacity(RECENT_SCAN_CAPACITY)),
        }
    }

    pub fn track_url(&self, fp: &Fingerprint, index: u32) -> String {
        format!("{}/tracks/{}/{:02}.mp3", self.base_url, fp, index + 1)
    }

    pub fn playlist_url(&self, fp: &Fingerprint) -> String {
        format!("{}/playlist/{}.m3u", self.base_url, fp)
    }

    pub fn metadata_url(&self, fp: &Fingerprint) -> String {
        format!("{}/tracks/{}/metadata.json", self.base_url, fp)
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn encoding(&self) -> &Arc<EncodingCoordinator> {
        &self.encoding
    }

    pub fn persist(&self) -> &Arc<PersistenceStore> {
        &self.persist
    }

    pub fn mirror(&self) -> &Arc<MirrorEngine> {
        &self.mirror
    }

    pub fn liveness(&self) -> &Arc<LivenessSupervisor> {
        &self.liveness
    }

    pub fn readers(&self) -> &Arc<ReaderStateMachine> {
        &self.readers
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    pub async fn recent_scans(&self) -> Vec<ScanRecord> {
        self.recent_scans.lock().await.iter().cloned().collect()
    }

    async fn record_scan(&self, record: ScanRecord) {
        let mut log = self.recent_scans.lock().await;
        if log.len() >= RECENT_SCAN_CAPACITY {
            log.pop_front();
        }
        log.push_back(record);
    }

    /// Entry point for `POST /tonie` (§6). `uid: None` means the tag was lifted.
    pub async fn scan(&self, request: ScanRequest) -> ScanResponse {
        if !ReaderDescriptor::is_virtual(&request.reader_ip) {
            let _ = self.persist.upsert_reader(&request.reader_ip, None).await;
        }

        let Some(uid) = request.uid.clone() else {
            return self.handle_removal(&request.reader_ip).await;
        };

        let Some(resolved) = self.resolve_tag(&request, &uid).await else {
            return ScanResponse { uid: Some(uid), found: false, ..Default::default() };
        };

        let fingerprint = Fingerprint::of_url(&resolved.audio_url);

        let Some(device) = self
            .readers
            .resolve_device(
                &request.reader_ip,
                request.mode,
                request.reader_is_sd_player,
                request.target_device.as_ref(),
            )
            .await
        else {
            warn!(reader_ip = %request.reader_ip, "no device could be resolved for scan");
            return ScanResponse { uid: Some(uid), found: true, ..Default::default() };
        };

        let prior_device = self.readers.snapshot(&request.reader_ip).await.and_then(|s| s.current_device);

        let snapshot = TagSnapshot {
            uid: uid.clone(),
            series: resolved.series.clone(),
            episode: resolved.episode.clone(),
            title: resolved.title.clone(),
            picture: resolved.picture.clone(),
            audio_url: resolved.audio_url.clone(),
            playback_url: Some(self.track_url(&fingerprint, 0)),
            placed_at: Utc::now(),
            start_position: 0.0,
            duration: resolved.tracks.iter().map(|t| t.duration_seconds).sum(),
            tracks: resolved.tracks.clone(),
        };

        let outcome = self.readers.scan(&request.reader_ip, snapshot, device.clone()).await;

        self.record_scan(ScanRecord {
            reader_ip: request.reader_ip.clone(),
            uid: Some(uid.clone()),
            target: Some(device.clone()),
            at: Utc::now(),
        })
        .await;

        match outcome {
            ScanOutcome::NoOp => {
                let state = self.readers.snapshot(&request.reader_ip).await.unwrap_or_default();
                ScanResponse {
                    uid: Some(uid),
                    series: resolved.series,
                    episode: resolved.episode,
                    title: resolved.title,
                    picture: resolved.picture,
                    found: true,
                    playback_started: true,
                    encoding: false,
                    playback_url: state.current_tag.and_then(|t| t.playback_url),
                    playlist_url: None,
                    track_count: resolved.tracks.len() as u32,
                    target: state.current_device,
                }
            }
            ScanOutcome::Restarted { resumed_from } => {
                if let Some(prior) = prior_device {
                    let adapter = self.devices.resolve(&prior).await;
                    adapter.stop().await;
                }
                self.start_playback(&request, &uid, &resolved, fingerprint, &device, resumed_from).await
            }
            ScanOutcome::Started { resumed_from } => {
                self.start_playback(&request, &uid, &resolved, fingerprint, &device, resumed_from).await
            }
        }
    }

    async fn handle_removal(&self, reader_ip: &str) -> ScanResponse {
        if let Some(state) = self.readers.snapshot(reader_ip).await {
            if let Some(device) = state.current_device.clone() {
                let adapter = self.devices.resolve(&device).await;
                adapter.pause().await;
            }
        }
        self.readers.on_tag_removed(reader_ip).await;
        if !ReaderDescriptor::is_virtual(reader_ip) {
            self.liveness.clear_stream(reader_ip).await;
        }
        ScanResponse { uid: None, found: false, ..Default::default() }
    }

    /// Resolves a tag's audio and track list, preferring a caller-supplied `audio_url`/`tracks`
    /// (manual streaming, legacy clients) over the content port (§4.8 step 2, §6).
    async fn resolve_tag(&self, request: &ScanRequest, uid: &str) -> Option<ResolvedTag> {
        if let Some(audio_url) = &request.audio_url {
            let tracks = request.tracks.clone().unwrap_or_else(|| vec![single_pseudo_track(SAFE_MAX_DURATION_SECONDS)]);
            return Some(ResolvedTag {
                audio_url: self.rewrite_library_url(audio_url),
                series: request.series.clone(),
                episode: request.episode.clone(),
                title: request.title.clone(),
                picture: request.picture.clone(),
                tracks,
            });
        }

        let suffix = uid_suffix(uid);
        match self.content.lookup_tag(&suffix).await {
            Ok(entry) if entry.valid && entry.exists => {
                let tracks = tracks_from_seconds(&entry.track_seconds, entry.known_duration());
                Some(ResolvedTag {
                    audio_url: self.rewrite_library_url(&entry.audio_url),
                    series: entry.tonie_info.series,
                    episode: entry.tonie_info.episode,
                    title: entry.tonie_info.title,
                    picture: entry.tonie_info.picture,
                    tracks,
                })
            }
            Ok(_) => {
                warn!(uid_suffix = %suffix, "content port reports tag invalid or missing");
                None
            }
            Err(error) => {
                warn!(uid_suffix = %suffix, %error, "content port lookup failed");
                None
            }
        }
    }

    fn rewrite_library_url(&self, url: &str) -> String {
        if url.starts_with("lib://") {
            self.content.resolve_library_url(url)
        } else {
            url.to_string()
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn start_playback(
        &self,
        request: &ScanRequest,
        uid: &str,
        resolved: &ResolvedTag,
        fingerprint: Fingerprint,
        device: &DeviceDescriptor,
        resumed_from: Option<f64>,
    ) -> ScanResponse {
        let title = resolved.title.clone().unwrap_or_else(|| uid.to_string());
        let album_tags = AlbumTags {
            title: title.clone(),
            artist: resolved.series.clone().unwrap_or_default(),
            album: resolved.episode.clone().unwrap_or_default(),
            year: None,
            source_url: resolved.audio_url.clone(),
        };

        let is_physical_sd =
            device.kind == DeviceKind::SdPlayer && !ReaderDescriptor::is_virtual(&request.reader_ip);

        if is_physical_sd && request.mode == ScanMode::Local {
            let folder = taglink_mirror::album_folder_name(resolved.series.as_deref(), resolved.episode.as_deref());
            if let Some(report) = self.mirror.verify_folder(&device.id, &folder, Some(uid)).await {
                if report.complete() {
                    let sd = self.devices.sd_player(&device.id).await;
                    sd.play_from_folder(&folder).await;
                    return self.response(uid, resolved, false, Some(format!("sd://{folder}")), None, device.clone());
                }
            }
        }

        let adapter = self.devices.resolve(device).await;

        if self.cache.has_metadata(&fingerprint).await {
            let urls: Vec<String> = (0..resolved.tracks.len() as u32).map(|i| self.track_url(&fingerprint, i)).collect();
            if urls.len() > 1 {
                adapter.play_list(&urls, &title).await;
            } else if let Some(first) = urls.first() {
                self.play_or_resume(&adapter, first, &title, resumed_from).await;
            }
            let playlist_url =
                (resolved.tracks.len() > 1).then(|| self.playlist_url(&fingerprint));
            if is_physical_sd {
                self.schedule_mirror(uid, resolved, &fingerprint, device.clone());
            }
            return self.response(uid, resolved, false, Some(self.track_url(&fingerprint, 0)), playlist_url, device.clone());
        }

        if device.kind == DeviceKind::Browser {
            self.spawn_full_album_encode(fingerprint.clone(), resolved.tracks.clone(), album_tags, resolved.picture.clone());
            return self.response(uid, resolved, true, Some(self.track_url(&fingerprint, 0)), None, device.clone());
        }

        // §4.3: when the scan came from a physical SD-capable reader, mirror every progress tick
        // onto that device's own cache-progress display rather than discarding it.
        let first_track_progress: Box<dyn ProgressSink> = if is_physical_sd {
            Box::new(SdProgressBridge::new(self.devices.clone(), device.id.clone()))
        } else {
            Box::new(NullProgressSink)
        };

        if let Err(error) = self
            .encoding
            .encode_first_track(&fingerprint, &resolved.tracks, &album_tags, resolved.picture.as_deref(), first_track_progress.as_ref())
            .await
        {
            warn!(%error, "first-track encode failed");
            return ScanResponse { uid: Some(uid.to_string()), found: true, playback_started: false, ..Default::default() };
        }

        let first_url = self.track_url(&fingerprint, 0);
        self.play_or_resume(&adapter, &first_url, &title, resumed_from).await;

        if is_physical_sd {
            self.liveness.register_stream(&request.reader_ip, &device.id, uid).await;
        }

        self.spawn_remaining_encode_and_mirror(
            uid.to_string(),
            resolved.clone(),
            fingerprint.clone(),
            album_tags,
            device.clone(),
            is_physical_sd,
            adapter.clone(),
            self.devices.clone(),
        );

        self.response(uid, resolved, true, Some(first_url), None, device.clone())
    }

    async fn play_or_resume(
        &self,
        adapter: &Arc<dyn taglink_devices::DeviceAdapter>,
        url: &str,
        title: &str,
        resumed_from: Option<f64>,
    ) {
        if let Some(position) = resumed_from {
            if adapter.resume().await {
                return;
            }
            adapter.play(url, title, Some(position)).await;
        } else {
            adapter.play(url, title, None).await;
        }
    }

    fn response(
        &self,
        uid: &str,
        resolved: &ResolvedTag,
        encoding: bool,
        playback_url: Option<String>,
        playlist_url: Option<String>,
        target: DeviceDescriptor,
    ) -> ScanResponse {
        ScanResponse {
            uid: Some(uid.to_string()),
            series: resolved.series.clone(),
            episode: resolved.episode.clone(),
            title: resolved.title.clone(),
            picture: resolved.picture.clone(),
            found: true,
            playback_started: true,
            encoding,
            playback_url,
            playlist_url,
            track_count: resolved.tracks.len() as u32,
            target: Some(target),
        }
    }

    // Only reached from the `DeviceKind::Browser` branch of `start_playback`, never from a
    // physical SD-capable device, so there's no device progress display to mirror onto here.
    fn spawn_full_album_encode(&self, fp: Fingerprint, tracks: Vec<Track>, album: AlbumTags, cover: Option<String>) {
        let encoding = self.encoding.clone();
        tokio::spawn(async move {
            if let Err(error) = encoding
                .get_or_encode_all(&fp, &tracks, &album, cover.as_deref(), &NullProgressSink)
                .await
            {
                warn!(fingerprint = %fp, %error, "background browser album encode failed");
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_remaining_encode_and_mirror(
        &self,
        uid: String,
        resolved: ResolvedTag,
        fp: Fingerprint,
        album: AlbumTags,
        device: DeviceDescriptor,
        is_physical_sd: bool,
        adapter: Arc<dyn taglink_devices::DeviceAdapter>,
        devices: Arc<taglink_devices::DeviceRegistry>,
    ) {
        let encoding = self.encoding.clone();
        let base_url = self.base_url.clone();
        let mirror = self.mirror.clone();
        let cache = self.cache.clone();
        let picture = resolved.picture.clone();
        let tracks = resolved.tracks.clone();
        let device_id = device.id.clone();

        tokio::spawn(async move {
            let bridge = DeviceQueueBridge::new(adapter, album.title.clone(), move |fp, i| {
                format!("{base_url}/tracks/{fp}/{:02}.mp3", i + 1)
            });
            let progress: Box<dyn ProgressSink> = if is_physical_sd {
                Box::new(SdProgressBridge::new(devices, device_id))
            } else {
                Box::new(NullProgressSink)
            };
            let result = encoding
                .encode_remaining(&fp, &tracks, &album, picture.as_deref(), progress.as_ref(), Some(&bridge))
                .await;

            match result {
                Ok(metadata) => {
                    info!(fingerprint = %fp, "background album encode complete");
                    if is_physical_sd {
                        schedule_mirror_upload(&mirror, &cache, &uid, &resolved, &fp, &metadata, device).await;
                    }
                }
                Err(error) => warn!(fingerprint = %fp, %error, "background remaining-track encode failed"),
            }
        });
    }

    /// Kicks off SD mirroring for an album that was already fully cached by the time a physical
    /// SD-player scan reached it (§4.8 step 7 fast path).
    fn schedule_mirror(&self, uid: &str, resolved: &ResolvedTag, fp: &Fingerprint, device: DeviceDescriptor) {
        let mirror = self.mirror.clone();
        let cache = self.cache.clone();
        let uid = uid.to_string();
        let resolved = resolved.clone();
        let fp = fp.clone();
        tokio::spawn(async move {
            let metadata = AlbumMetadata {
                title: resolved.title.clone().unwrap_or_else(|| uid.clone()),
                artist: resolved.series.clone().unwrap_or_default(),
                album: resolved.episode.clone().unwrap_or_default(),
                year: None,
                total_duration: resolved.tracks.iter().map(|t| t.duration_seconds).sum(),
                source_url: resolved.audio_url.clone(),
                tracks: resolved.tracks.clone(),
            };
            schedule_mirror_upload(&mirror, &cache, &uid, &resolved, &fp, &metadata, device).await;
        });
    }

    /// Remote-control actions routed through a reader's currently resolved device (§6 `POST
    /// /control`).
    pub async fn control(&self, reader_ip: &str, action: ControlAction) -> bool {
        let Some(state) = self.readers.snapshot(reader_ip).await else { return false };
        let Some(device) = state.current_device.clone() else { return false };
        let adapter = self.devices.resolve(&device).await;
        match action {
            ControlAction::Play => adapter.resume().await,
            ControlAction::Pause => adapter.pause().await,
            ControlAction::Stop => {
                let ok = adapter.stop().await;
                self.readers.clear(reader_ip).await;
                ok
            }
            // Neither the adapter port nor any backend exposes a skip/volume primitive (§4.4);
            // best-effort failure per §4.4's failure model.
            ControlAction::Skip | ControlAction::Prev | ControlAction::VolumeUp | ControlAction::VolumeDown => false,
        }
    }

    /// `POST /readers/{ip}/heartbeat` (§6): refreshes the reader record and resumes any pending
    /// upload for that device.
    pub async fn heartbeat(&self, reader_ip: &str, name: Option<String>) {
        let _ = self.persist.upsert_reader(reader_ip, name).await;
        self.mirror.resume(reader_ip).await;
    }

    /// Position update pushed by a browser client (§4.6, §9).
    pub async fn report_browser_position(&self, reader_ip: &str, position_seconds: f64) {
        self.readers.report_browser_position(reader_ip, position_seconds).await;
    }
}

/// Snapshot of one tag once resolved, whichever source it came from (§4.8 step 2).
#[derive(Debug, Clone)]
struct ResolvedTag {
    audio_url: String,
    series: Option<String>,
    episode: Option<String>,
    title: Option<String>,
    picture: Option<String>,
    tracks: Vec<Track>,
}

async fn schedule_mirror_upload(
    mirror: &Arc<MirrorEngine>,
    cache: &Arc<CacheStore>,
    uid: &str,
    resolved: &ResolvedTag,
    fp: &Fingerprint,
    metadata: &AlbumMetadata,
    device: DeviceDescriptor,
) {
    let folder = taglink_mirror::album_folder_name(resolved.series.as_deref(), resolved.episode.as_deref());
    let tracks: Vec<UploadTrack> = metadata
        .tracks
        .iter()
        .map(|t| {
            let dest_path = format!("{}/{}", MirrorEngine::destination_for(&folder), taglink_mirror::track_file_name(t.index, &t.name));
            UploadTrack {
                index: t.index,
                name: t.name.clone(),
                source_path: cache.track_path(fp, t.index),
                dest_path,
                duration_seconds: t.duration_seconds,
            }
        })
        .collect();

    let intent = UploadIntent {
        uid: uid.to_string(),
        series: resolved.series.clone(),
        episode: resolved.episode.clone(),
        folder_path: folder,
        audio_url: resolved.audio_url.clone(),
        tracks,
        queued_at: Utc::now(),
        status: UploadStatus::Pending,
    };
    mirror.queue_intent(&device.id, intent).await;
}

/// Builds the cumulative-timestamp track list a resolved tag carries (§3, §8 boundary):
/// adjacent entries in `track_seconds` become one track's `{start, duration}`. Fewer than two
/// entries leaves no boundary pair to split, so a single pseudo-track is synthesized instead,
/// sized from `known_duration` (the upstream index's own `track_seconds[-1]`) when one element
/// was present, or the safe maximum when the list was empty and no duration is known at all.
fn tracks_from_seconds(track_seconds: &[f64], known_duration: f64) -> Vec<Track> {
    if track_seconds.len() < 2 {
        let duration = if track_seconds.is_empty() { SAFE_MAX_DURATION_SECONDS } else { known_duration };
        return vec![single_pseudo_track(duration)];
    }
    track_seconds
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Track {
            index: i as u32,
            name: format!("Track {}", i + 1),
            start_seconds: pair[0],
            duration_seconds: (pair[1] - pair[0]).max(0.01),
        })
        .collect()
}

fn single_pseudo_track(duration: f64) -> Track {
    Track { index: 0, name: "Track 1".to_string(), start_seconds: 0.0, duration_seconds: duration.min(SAFE_MAX_DURATION_SECONDS) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_matches_last_eight_hex_chars_case_insensitively() {
        assert_eq!(uid_suffix("e0:04:03:50:13:16:80:4b"), "1316804B");
    }

    #[test]
    fn tracks_from_seconds_builds_contiguous_windows() {
        let tracks = tracks_from_seconds(&[0.0, 120.0, 240.0], 240.0);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].start_seconds, 0.0);
        assert_eq!(tracks[0].duration_seconds, 120.0);
        assert_eq!(tracks[1].start_seconds, 120.0);
    }

    #[test]
    fn empty_seconds_synthesizes_one_pseudo_track() {
        let tracks = tracks_from_seconds(&[], 0.0);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].duration_seconds, SAFE_MAX_DURATION_SECONDS);
    }

    #[test]
    fn single_known_second_uses_that_value_capped() {
        let tracks = tracks_from_seconds(&[185.3], 185.3);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].duration_seconds, 185.3);

        let tracks = tracks_from_seconds(&[50_000.0], 50_000.0);
        assert_eq!(tracks[0].duration_seconds, SAFE_MAX_DURATION_SECONDS);
    }
}
