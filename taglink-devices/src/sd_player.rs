use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::adapter::{DeviceAdapter, PositionInfo, TransportState};
use crate::error::DeviceError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// SD-player endpoint kind (§4.4): an espuino-style device exposing an HTTP explorer/upload
/// surface and its own local SD storage. `base_url` is `http://{ip}` as resolved from the
/// scanning reader's own address, since an SD-player reader is both the tag source and, in
/// "local" mode, the playback target.
pub struct SdPlayerAdapter {
    base_url: String,
    http: reqwest::Client,
}

impl SdPlayerAdapter {
    pub fn new(ip: impl Into<String>) -> Self {
        let ip = ip.into();
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_default();
        SdPlayerAdapter { base_url: format!("http://{ip}"), http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Plays directly from the device's own SD card folder, skipping streaming entirely
    /// (§4.8 step 7: used when SD verification already reports `complete`).
    pub async fn play_from_folder(&self, folder: &str) -> bool {
        let body = serde_json::json!({ "folder": folder, "mode": "sd" });
        self.post_ok("/explorer", &body).await
    }

    /// Binds a tag UID to a folder with a fixed play-mode on the device, so a bare scan plays
    /// locally without involving this system again (§4.5, step after verification completes).
    pub async fn bind_tag_folder(&self, tag_id: &str, folder: &str) -> bool {
        let body = serde_json::json!({ "tagId": tag_id, "folder": folder, "playMode": "fixed" });
        self.post_ok("/tagconf", &body).await
    }

    /// Forwards an encoding-progress percentage to the device's own cache-progress display
    /// (the SD-player-specific `progress_sink` mentioned in §4.3's grounding).
    pub async fn report_cache_progress(&self, percent: u8) {
        let body = serde_json::json!({ "percent": percent });
        let _ = self.post_ok("/cacheprogress", &body).await;
    }

    /// Queries the device's currently-active tag, for the Liveness Supervisor's probe (§4.7).
    /// Returns `None` on any decode/connect failure — callers treat that as "unreachable",
    /// a no-op per §4.7's transition table, not an error to propagate.
    pub async fn active_tag(&self) -> Option<String> {
        let response = self.http.get(self.url("/tag")).send().await.ok()?;
        let body: serde_json::Value = response.json().await.ok()?;
        body.get("activeTagId").and_then(|v| v.as_str()).map(str::to_owned)
    }

    async fn post_ok(&self, path: &str, body: &serde_json::Value) -> bool {
        match self.http.post(self.url(path)).json(body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), path, "sd-player returned non-success status");
                false
            }
            Err(error) => {
                warn!(%error, path, "sd-player request failed");
                false
            }
        }
    }
}

#[async_trait]
impl DeviceAdapter for SdPlayerAdapter {
    async fn play(&self, url: &str, title: &str, _start: Option<f64>) -> bool {
        let body = serde_json::json!({ "url": url, "title": title, "mode": "stream" });
        self.post_ok("/explorer", &body).await
    }

    async fn play_list(&self, urls: &[String], title: &str) -> bool {
        // No direct playlist primitive; only the first URL is played directly (§4.4 table). The
        // full album reaches the device via SD-folder mode once the mirror upload completes.
        match urls.first() {
            Some(first) => self.play(first, title, None).await,
            None => false,
        }
    }

    async fn queue(&self, _url: &str, _title: &str) -> bool {
        false
    }

    async fn pause(&self) -> bool {
        self.post_ok("/pause-play", &serde_json::json!({})).await
    }

    async fn resume(&self) -> bool {
        self.post_ok("/pause-play", &serde_json::json!({})).await
    }

    async fn stop(&self) -> bool {
        // The device's stop path is a websocket command in the reference firmware; this system
        // bridges it through the same HTTP control surface the rest of the adapter uses.
        self.post_ok("/control", &serde_json::json!({ "cmd": "stop" })).await
    }

    async fn seek(&self, _position_seconds: f64) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }

    async fn position(&self) -> Option<PositionInfo> {
        // Documented as unreliable (§4.4); best-effort only, never relied on for resume.
        let response = self.http.get(self.url("/track")).send().await.ok()?;
        let body: serde_json::Value = response.json().await.ok()?;
        let position_seconds = body.get("position")?.as_f64()?;
        Some(PositionInfo { position_seconds, duration_seconds: None })
    }

    async fn transport_state(&self) -> Option<TransportState> {
        None
    }
}
