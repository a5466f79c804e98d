use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use taglink_devices::DeviceRegistry;

use crate::streams::StreamRegistry;
use crate::tag_id::derive_device_tag_id;

const PROBE_PERIOD: StdDuration = StdDuration::from_secs(60);
const STALE_CUTOFF_SECONDS: i64 = 180;

/// Periodic probe of SD-capable readers (§4.7). Renews `last_seen` on a match between the
/// device's reported active tag and the one this system believes is playing; leaves mismatches
/// and unreachable devices alone for the stale-stream reaper to clean up.
pub struct LivenessSupervisor {
    devices: Arc<DeviceRegistry>,
    streams: Arc<Mutex<StreamRegistry>>,
}

impl LivenessSupervisor {
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        LivenessSupervisor { devices, streams: Arc::new(Mutex::new(StreamRegistry::new())) }
    }

    pub fn streams(&self) -> Arc<Mutex<StreamRegistry>> {
        self.streams.clone()
    }

    pub async fn register_stream(&self, reader_ip: &str, device_id: &str, uid: &str) {
        self.streams.lock().await.register(reader_ip, device_id, uid);
    }

    pub async fn clear_stream(&self, reader_ip: &str) {
        self.streams.lock().await.clear(reader_ip);
    }

    /// One probe pass over every tracked stream, then a reap of anything stale. Exposed
    /// separately from [`Self::run`] so tests and the Orchestrator's manual heartbeat path can
    /// drive it without a sleeping background task.
    pub async fn probe_once(&self) {
        let active = self.streams.lock().await.active();
        for entry in active {
            let Some(expected) = derive_device_tag_id(&entry.uid) else {
                continue;
            };
            let sd = self.devices.sd_player(&entry.device_id).await;
            match sd.active_tag().await {
                Some(reported) if reported == expected => {
                    self.streams.lock().await.touch(&entry.reader_ip);
                    debug!(reader_ip = %entry.reader_ip, "liveness match, renewed stream");
                }
                Some(reported) => {
                    debug!(reader_ip = %entry.reader_ip, expected, reported, "liveness mismatch, leaving to reaper");
                }
                None => {
                    debug!(reader_ip = %entry.reader_ip, "sd-player unreachable, leaving to reaper");
                }
            }
        }
        let reaped = self.streams.lock().await.reap_stale(STALE_CUTOFF_SECONDS);
        for entry in reaped {
            warn!(reader_ip = %entry.reader_ip, "stale stream reaped");
        }
    }

    /// Spawns the background probe loop at the standard ~60s period. Returns the task handle so
    /// callers can abort it on shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROBE_PERIOD);
            loop {
                interval.tick().await;
                self.probe_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_with_no_streams_is_a_noop() {
        let supervisor = LivenessSupervisor::new(Arc::new(DeviceRegistry::new()));
        supervisor.probe_once().await;
        assert!(supervisor.streams().lock().await.active().is_empty());
    }

    #[tokio::test]
    async fn register_and_clear_roundtrip() {
        let supervisor = LivenessSupervisor::new(Arc::new(DeviceRegistry::new()));
        supervisor.register_stream("192.168.1.20", "sd-192.168.1.20", "AABBCCDD").await;
        assert_eq!(supervisor.streams().lock().await.active().len(), 1);
        supervisor.clear_stream("192.168.1.20").await;
        assert!(supervisor.streams().lock().await.active().is_empty());
    }
}
