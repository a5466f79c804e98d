use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::adapter::{DeviceAdapter, PositionInfo, TransportState};
use crate::error::DeviceError;

/// Browser endpoint kind (§4.4): the UI element itself performs playback; this adapter only
/// accepts the client-reported position pushed over the scan/heartbeat surface and always
/// reports success for control operations, since the client is trusted to have actually acted
/// on them.
pub struct BrowserAdapter {
    last_reported_position: Mutex<Option<f64>>,
    duration_seconds: AtomicU64,
}

impl BrowserAdapter {
    pub fn new() -> Self {
        BrowserAdapter { last_reported_position: Mutex::new(None), duration_seconds: AtomicU64::new(0) }
    }

    /// Records a position update pushed by the browser client. This is the *only* source of
    /// truth for browser position (§4.6, §9): the wall-clock fallback used by other kinds is
    /// explicitly forbidden here.
    pub fn report_position(&self, position_seconds: f64, duration_seconds: Option<f64>) {
        *self.last_reported_position.lock().unwrap() = Some(position_seconds);
        if let Some(duration) = duration_seconds {
            self.duration_seconds.store(duration.to_bits(), Ordering::Relaxed);
        }
    }
}

impl Default for BrowserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceAdapter for BrowserAdapter {
    async fn play(&self, _url: &str, _title: &str, _start: Option<f64>) -> bool {
        true
    }

    async fn play_list(&self, _urls: &[String], _title: &str) -> bool {
        true
    }

    async fn queue(&self, _url: &str, _title: &str) -> bool {
        false
    }

    async fn pause(&self) -> bool {
        true
    }

    async fn resume(&self) -> bool {
        true
    }

    async fn stop(&self) -> bool {
        *self.last_reported_position.lock().unwrap() = None;
        true
    }

    async fn seek(&self, _position_seconds: f64) -> Result<(), DeviceError> {
        // Client-side; the browser performs its own seeking. Reported as unsupported from the
        // server's point of view rather than silently succeeding, so callers don't assume the
        // device state actually changed.
        Err(DeviceError::Unsupported)
    }

    async fn position(&self) -> Option<PositionInfo> {
        let position_seconds = (*self.last_reported_position.lock().unwrap())?;
        let raw_duration = f64::from_bits(self.duration_seconds.load(Ordering::Relaxed));
        let duration_seconds = if raw_duration > 0.0 { Some(raw_duration) } else { None };
        Some(PositionInfo { position_seconds, duration_seconds })
    }

    async fn transport_state(&self) -> Option<TransportState> {
        None
    }
}
