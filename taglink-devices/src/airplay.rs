use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::adapter::{DeviceAdapter, PositionInfo, TransportState};
use crate::error::DeviceError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// AirPlay-like endpoint kind (§4.4): devices speaking the LinkPlay HTTP command API
/// (`/httpapi.asp?command=...`), the protocol LinkPlay- and Arylic-based receivers expose for
/// pushing a stream URL and issuing basic transport commands. No playlist, queue, or seek
/// primitive exists in this API; only the first track of any requested list is played and
/// `stop` is implemented as the closest equivalent the protocol exposes (pause).
pub struct AirplayLikeAdapter {
    host: String,
    http: reqwest::Client,
}

impl AirplayLikeAdapter {
    pub fn new(host: impl Into<String>) -> Self {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_default();
        AirplayLikeAdapter { host: host.into(), http }
    }

    fn command_url(&self, command: &str) -> String {
        format!("http://{}/httpapi.asp?command={}", self.host, command)
    }

    async fn send_command(&self, command: &str) -> bool {
        match self.http.get(self.command_url(command)).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(host = %self.host, status = %response.status(), command, "linkplay command rejected");
                false
            }
            Err(error) => {
                warn!(host = %self.host, %error, command, "linkplay command failed");
                false
            }
        }
    }
}

#[async_trait]
impl DeviceAdapter for AirplayLikeAdapter {
    async fn play(&self, url: &str, _title: &str, _start: Option<f64>) -> bool {
        let encoded = urlencoding_minimal(url);
        self.send_command(&format!("setPlayerCmd:play:{encoded}")).await
    }

    async fn play_list(&self, urls: &[String], title: &str) -> bool {
        match urls.first() {
            Some(first) => self.play(first, title, None).await,
            None => false,
        }
    }

    async fn queue(&self, _url: &str, _title: &str) -> bool {
        false
    }

    async fn pause(&self) -> bool {
        self.send_command("setPlayerCmd:pause").await
    }

    async fn resume(&self) -> bool {
        self.send_command("setPlayerCmd:resume").await
    }

    async fn stop(&self) -> bool {
        self.send_command("setPlayerCmd:pause").await
    }

    async fn seek(&self, _position_seconds: f64) -> Result<(), DeviceError> {
        Err(DeviceError::Unsupported)
    }

    async fn position(&self) -> Option<PositionInfo> {
        None
    }

    async fn transport_state(&self) -> Option<TransportState> {
        None
    }
}

/// Minimal percent-encoding for the handful of characters that appear in stream URLs and would
/// otherwise break the `command=` query value; full RFC3986 encoding isn't needed since the URL
/// itself is already escaped by its origin.
fn urlencoding_minimal(s: &str) -> String {
    s.replace(':', "%3A").replace('/', "%2F").replace('?', "%3F").replace('&', "%26")
}
