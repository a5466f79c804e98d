use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use taglink_core::{DeviceDescriptor, DeviceKind, ReaderState, ResumeRecord, ScanMode, TagSnapshot};
use taglink_devices::DeviceRegistry;

/// Outcome of a scan, for the Orchestrator to turn into an HTTP response (§4.8, §6).
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// A fresh playback session started, at `resumed_from` if a matching resume record existed.
    Started { resumed_from: Option<f64> },
    /// The same tag was already playing on this reader; no device action was taken. Per §4.6,
    /// the caller must still receive the existing `playback_url`, never a null one.
    NoOp,
    /// A different tag was already playing; it was stopped (without saving resume) and the new
    /// one started.
    Restarted { resumed_from: Option<f64> },
}

/// Per-reader lifecycle (§4.6): scan, removal, resume, device-override resolution, progressive
/// playback start. Owns the only mutable copy of [`ReaderState`] per reader; all mutation goes
/// through this type's methods so transitions are serialized per reader (§5 ordering
/// guarantees — a tokio `RwLock` per reader would allow interleaving, so instead every method
/// holds the single process-wide write lock for its whole critical section).
pub struct ReaderStateMachine {
    devices: Arc<DeviceRegistry>,
    states: RwLock<HashMap<String, ReaderState>>,
    temp_overrides: RwLock<HashMap<String, DeviceDescriptor>>,
    persisted_overrides: RwLock<HashMap<String, DeviceDescriptor>>,
    default_device: RwLock<Option<DeviceDescriptor>>,
}

impl ReaderStateMachine {
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        ReaderStateMachine {
            devices,
            states: RwLock::new(HashMap::new()),
            temp_overrides: RwLock::new(HashMap::new()),
            persisted_overrides: RwLock::new(HashMap::new()),
            default_device: RwLock::new(None),
        }
    }

    pub async fn set_default_device(&self, device: Option<DeviceDescriptor>) {
        *self.default_device.write().await = device;
    }

    pub async fn set_temporary_override(&self, reader_ip: &str, device: Option<DeviceDescriptor>) {
        match device {
            Some(d) => self.temp_overrides.write().await.insert(reader_ip.to_string(), d),
            None => self.temp_overrides.write().await.remove(reader_ip),
        };
    }

    pub async fn set_persisted_override(&self, reader_ip: &str, device: Option<DeviceDescriptor>) {
        match device {
            Some(d) => self.persisted_overrides.write().await.insert(reader_ip.to_string(), d),
            None => self.persisted_overrides.write().await.remove(reader_ip),
        };
    }

    /// Device-override resolution order (§4.6): temporary per-reader override → persisted
    /// per-reader override → requested target → active default. An SD-capable reader scanning
    /// in `Local` mode implicitly overrides to itself, ahead of everything else, since "local"
    /// means "play from my own storage" by definition.
    pub async fn resolve_device(
        &self,
        reader_ip: &str,
        mode: ScanMode,
        reader_is_sd_player: bool,
        requested_target: Option<&DeviceDescriptor>,
    ) -> Option<DeviceDescriptor> {
        if reader_is_sd_player && mode == ScanMode::Local {
            return Some(DeviceDescriptor::new(DeviceKind::SdPlayer, reader_ip.to_string()));
        }
        if let Some(temp) = self.temp_overrides.read().await.get(reader_ip) {
            return Some(temp.clone());
        }
        if let Some(persisted) = self.persisted_overrides.read().await.get(reader_ip) {
            return Some(persisted.clone());
        }
        if let Some(target) = requested_target {
            return Some(target.clone());
        }
        self.default_device.read().await.clone()
    }

    /// Drives a scan through the Idle/Playing/Paused transition table (§4.6).
    pub async fn scan(&self, reader_ip: &str, tag: TagSnapshot, device: DeviceDescriptor) -> ScanOutcome {
        let mut states = self.states.write().await;
        let state = states.entry(reader_ip.to_string()).or_default();

        let same_tag_playing = matches!(&state.current_tag, Some(current) if current.uid == tag.uid)
            && !state.is_paused();
        if same_tag_playing {
            debug!(reader_ip, uid = %tag.uid, "scan of already-playing tag is a no-op");
            return ScanOutcome::NoOp;
        }

        let is_restart = matches!(&state.current_tag, Some(current) if current.uid != tag.uid);
        if is_restart {
            info!(reader_ip, old_uid = %state.current_tag.as_ref().unwrap().uid, new_uid = %tag.uid, "different tag scanned, restarting without resume");
            state.resume = None;
        }

        let resumed_from = state
            .resume
            .take()
            .filter(|r| r.uid == tag.uid && r.paused && device_matches(&r.device, &device))
            .map(|r| r.position);

        state.current_tag = Some(tag);
        state.current_device = Some(device);
        state.current_started_at = Some(Utc::now());
        state.current_offset = resumed_from.unwrap_or(0.0);
        state.last_reported_position = None;

        if is_restart {
            ScanOutcome::Restarted { resumed_from }
        } else {
            ScanOutcome::Started { resumed_from }
        }
    }

    /// Tag removed from the reader (§4.6 Playing → Paused): keeps `current_tag` set (so UIs
    /// still display it) and records a resume point.
    pub async fn on_tag_removed(&self, reader_ip: &str) -> Option<ResumeRecord> {
        let mut states = self.states.write().await;
        let state = states.get_mut(reader_ip)?;
        let tag = state.current_tag.as_ref()?;
        let device = state.current_device.clone()?;
        let position = self.compute_position(state, &device).await;
        let resume = ResumeRecord { uid: tag.uid.clone(), position, device, paused: true };
        state.resume = Some(resume.clone());
        Some(resume)
    }

    /// Explicit stop (§4.6 Playing → Stopped): clears all position/tag state. Does not itself
    /// call the device adapter — the Orchestrator does that and then calls this to clear state.
    pub async fn clear(&self, reader_ip: &str) {
        if let Some(state) = self.states.write().await.get_mut(reader_ip) {
            state.current_tag = None;
            state.current_device = None;
            state.current_started_at = None;
            state.current_offset = 0.0;
            state.last_reported_position = None;
            state.resume = None;
        }
    }

    /// Records a position update pushed by a browser client (§4.6 position computation, §9:
    /// the only trustworthy source for that kind).
    pub async fn report_browser_position(&self, reader_ip: &str, position_seconds: f64) {
        if let Some(state) = self.states.write().await.get_mut(reader_ip) {
            state.last_reported_position = Some(position_seconds);
        }
    }

    pub async fn snapshot(&self, reader_ip: &str) -> Option<ReaderState> {
        self.states.read().await.get(reader_ip).cloned()
    }

    /// Position computation (§4.6): trust only client-reported position for `Browser`; query
    /// the device adapter otherwise; fall back to wall-clock `offset + (now - started_at)` only
    /// when the adapter can't report one.
    async fn compute_position(&self, state: &ReaderState, device: &DeviceDescriptor) -> f64 {
        if device.kind == DeviceKind::Browser {
            return state.last_reported_position.unwrap_or(state.current_offset);
        }
        let adapter = self.devices.resolve(device).await;
        if let Some(info) = adapter.position().await {
            return info.position_seconds;
        }
        let elapsed = state
            .current_started_at
            .map(|started| (Utc::now() - started).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        state.current_offset + elapsed
    }
}

fn device_matches(a: &DeviceDescriptor, b: &DeviceDescriptor) -> bool {
    a.kind == b.kind && a.id == b.id
}

#[cfg(test)]
mod tests {
    use super::*;
    use taglink_core::Track;

    fn sample_tag(uid: &str) -> TagSnapshot {
        TagSnapshot {
            uid: uid.to_string(),
            series: None,
            episode: None,
            title: None,
            picture: None,
            audio_url: "https://content.example/a".into(),
            playback_url: Some("http://localhost/tracks/fp/01.mp3".into()),
            placed_at: Utc::now(),
            start_position: 0.0,
            duration: 10.0,
            tracks: vec![Track { index: 0, name: "one".into(), start_seconds: 0.0, duration_seconds: 10.0 }],
        }
    }

    #[tokio::test]
    async fn first_scan_starts_fresh() {
        let sm = ReaderStateMachine::new(Arc::new(DeviceRegistry::new()));
        let device = DeviceDescriptor::new(DeviceKind::Browser, "browser-session");
        let outcome = sm.scan("reader-1", sample_tag("AABBCCDD"), device).await;
        assert!(matches!(outcome, ScanOutcome::Started { resumed_from: None }));
    }

    #[tokio::test]
    async fn repeat_scan_while_playing_is_noop() {
        let sm = ReaderStateMachine::new(Arc::new(DeviceRegistry::new()));
        let device = DeviceDescriptor::new(DeviceKind::Browser, "browser-session");
        sm.scan("reader-1", sample_tag("AABBCCDD"), device.clone()).await;
        let outcome = sm.scan("reader-1", sample_tag("AABBCCDD"), device).await;
        assert!(matches!(outcome, ScanOutcome::NoOp));
    }

    #[tokio::test]
    async fn removal_then_return_resumes_at_recorded_position() {
        let sm = ReaderStateMachine::new(Arc::new(DeviceRegistry::new()));
        let device = DeviceDescriptor::new(DeviceKind::Browser, "browser-session");
        sm.scan("reader-1", sample_tag("AABBCCDD"), device.clone()).await;
        sm.report_browser_position("reader-1", 42.0).await;
        let resume = sm.on_tag_removed("reader-1").await.unwrap();
        assert_eq!(resume.position, 42.0);
        assert!(resume.paused);

        let outcome = sm.scan("reader-1", sample_tag("AABBCCDD"), device).await;
        match outcome {
            ScanOutcome::Started { resumed_from } => assert_eq!(resumed_from, Some(42.0)),
            other => panic!("expected Started with resume, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn different_tag_restarts_without_resume() {
        let sm = ReaderStateMachine::new(Arc::new(DeviceRegistry::new()));
        let device = DeviceDescriptor::new(DeviceKind::Browser, "browser-session");
        sm.scan("reader-1", sample_tag("AABBCCDD"), device.clone()).await;
        sm.report_browser_position("reader-1", 55.0).await;
        let outcome = sm.scan("reader-1", sample_tag("11223344"), device).await;
        match outcome {
            ScanOutcome::Restarted { resumed_from } => assert_eq!(resumed_from, None),
            other => panic!("expected Restarted, got {other:?}"),
        }
    }
}
