use std::sync::Arc;

use taglink_core::Fingerprint;
use taglink_devices::DeviceRegistry;
use taglink_encoding::ProgressSink;

/// Bridges the Encoding Coordinator's synchronous, fire-and-forget [`ProgressSink`] callback to
/// the SD-player adapter's async `report_cache_progress` operation (§4.3's grounding, §4.8 step
/// 7): when a scan originated from a physical SD-capable reader, the device's own display can
/// mirror the cache-encode percentage. Each notification spawns its own task, matching
/// [`crate::DeviceQueueBridge`]'s reasoning — a slow or unreachable device must never stall the
/// encode loop driving it.
pub struct SdProgressBridge {
    devices: Arc<DeviceRegistry>,
    device_id: String,
}

impl SdProgressBridge {
    pub fn new(devices: Arc<DeviceRegistry>, device_id: impl Into<String>) -> Self {
        SdProgressBridge { devices, device_id: device_id.into() }
    }
}

impl ProgressSink for SdProgressBridge {
    fn on_progress(&self, _fingerprint: &Fingerprint, percent: u8) {
        let devices = self.devices.clone();
        let device_id = self.device_id.clone();
        tokio::spawn(async move {
            let sd = devices.sd_player(&device_id).await;
            sd.report_cache_progress(percent).await;
        });
    }
}
