use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

use crate::adapter::{DeviceAdapter, PositionInfo, TransportState};
use crate::error::DeviceError;
use crate::soap::{extract_element, hms_to_seconds, invoke_action, seconds_to_hms};

const AVTRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";
const ADVANCE_POLL_PERIOD: Duration = Duration::from_secs(2);

/// Multi-room endpoint kind (§4.4): a UPnP AVTransport-capable renderer. Queueing is modeled as
/// an in-memory FIFO owned by this adapter rather than the device's own OpenHome Playlist
/// service, since AVTransport alone exposes only a single current URI; `queue` appends here and
/// the adapter advances to the next entry itself once the device reports `STOPPED`.
pub struct MultiroomAdapter {
    control_url: String,
    http: reqwest::Client,
    queue: Mutex<Vec<(String, String)>>,
}

impl MultiroomAdapter {
    pub fn new(control_url: impl Into<String>) -> Self {
        MultiroomAdapter {
            control_url: control_url.into(),
            http: reqwest::Client::new(),
            queue: Mutex::new(Vec::new()),
        }
    }

    async fn set_uri_and_play(&self, url: &str, title: &str) -> bool {
        let meta = format!(
            "<DIDL-Lite xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\"><item><dc:title xmlns:dc=\"http://purl.org/dc/elements/1.1/\">{}</dc:title></item></DIDL-Lite>",
            title.replace('&', "&amp;")
        );
        let set_ok = invoke_action(
            &self.http,
            &self.control_url,
            AVTRANSPORT,
            "SetAVTransportURI",
            &[("InstanceID", "0"), ("CurrentURI", url), ("CurrentURIMetaData", &meta)],
        )
        .await
        .is_ok();
        if !set_ok {
            return false;
        }
        invoke_action(&self.http, &self.control_url, AVTRANSPORT, "Play", &[("InstanceID", "0"), ("Speed", "1")])
            .await
            .is_ok()
    }

    /// Advances the in-memory queue and plays the next entry, if any. Called by the
    /// Orchestrator's queue-sink callback when a subsequent track finishes encoding, and by
    /// internal advance-on-stop polling.
    pub async fn advance_queue(&self) -> bool {
        let next = {
            let mut queue = self.queue.lock().unwrap();
            if queue.is_empty() { None } else { Some(queue.remove(0)) }
        };
        match next {
            Some((url, title)) => self.set_uri_and_play(&url, &title).await,
            None => false,
        }
    }

    fn queue_is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Spawns the background poll that drives `advance_queue`: AVTransport has no native
    /// playlist-finished signal, so the only way to notice a track ended is to poll transport
    /// state and advance once it reports STOPPED with more queued. Returns the task handle so
    /// the registry can abort it on eviction.
    pub fn spawn_queue_advancer(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let adapter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ADVANCE_POLL_PERIOD);
            loop {
                interval.tick().await;
                if adapter.queue_is_empty() {
                    continue;
                }
                if let Some(TransportState::Stopped) = adapter.transport_state().await {
                    adapter.advance_queue().await;
                }
            }
        })
    }
}

#[async_trait]
impl DeviceAdapter for MultiroomAdapter {
    async fn play(&self, url: &str, title: &str, start: Option<f64>) -> bool {
        if !self.set_uri_and_play(url, title).await {
            return false;
        }
        if let Some(start) = start {
            let _ = self.seek(start).await;
        }
        true
    }

    async fn play_list(&self, urls: &[String], title: &str) -> bool {
        {
            let mut queue = self.queue.lock().unwrap();
            queue.clear();
            for url in urls.iter().skip(1) {
                queue.push((url.clone(), title.to_string()));
            }
        }
        match urls.first() {
            Some(first) => self.set_uri_and_play(first, title).await,
            None => false,
        }
    }

    async fn queue(&self, url: &str, title: &str) -> bool {
        self.queue.lock().unwrap().push((url.to_string(), title.to_string()));
        true
    }

    async fn pause(&self) -> bool {
        invoke_action(&self.http, &self.control_url, AVTRANSPORT, "Pause", &[("InstanceID", "0")]).await.is_ok()
    }

    async fn resume(&self) -> bool {
        invoke_action(&self.http, &self.control_url, AVTRANSPORT, "Play", &[("InstanceID", "0"), ("Speed", "1")])
            .await
            .is_ok()
    }

    async fn stop(&self) -> bool {
        self.queue.lock().unwrap().clear();
        invoke_action(&self.http, &self.control_url, AVTRANSPORT, "Stop", &[("InstanceID", "0")]).await.is_ok()
    }

    async fn seek(&self, position_seconds: f64) -> Result<(), DeviceError> {
        let target = seconds_to_hms(position_seconds);
        invoke_action(
            &self.http,
            &self.control_url,
            AVTRANSPORT,
            "Seek",
            &[("InstanceID", "0"), ("Unit", "REL_TIME"), ("Target", &target)],
        )
        .await
        .map(|_| ())
    }

    async fn position(&self) -> Option<PositionInfo> {
        let xml = invoke_action(&self.http, &self.control_url, AVTRANSPORT, "GetPositionInfo", &[("InstanceID", "0")])
            .await
            .inspect_err(|e| warn!(error = %e, "multiroom GetPositionInfo failed"))
            .ok()?;
        let position_seconds = hms_to_seconds(&extract_element(&xml, "RelTime")?)?;
        let duration_seconds = extract_element(&xml, "TrackDuration").and_then(|s| hms_to_seconds(&s));
        Some(PositionInfo { position_seconds, duration_seconds })
    }

    async fn transport_state(&self) -> Option<TransportState> {
        let xml = invoke_action(&self.http, &self.control_url, AVTRANSPORT, "GetTransportInfo", &[("InstanceID", "0")])
            .await
            .ok()?;
        match extract_element(&xml, "CurrentTransportState")?.as_str() {
            "PLAYING" => Some(TransportState::Playing),
            "PAUSED_PLAYBACK" => Some(TransportState::Paused),
            "STOPPED" => Some(TransportState::Stopped),
            "TRANSITIONING" => Some(TransportState::Buffering),
            _ => None,
        }
    }
}
