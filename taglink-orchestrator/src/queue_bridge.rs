use std::path::Path;
use std::sync::Arc;

use taglink_core::Fingerprint;
use taglink_devices::DeviceAdapter;
use taglink_encoding::QueueSink;

/// Bridges the Encoding Coordinator's synchronous, fire-and-forget [`QueueSink`] callback to a
/// device adapter's async `queue` operation (§4.8 step 6). Each notification spawns its own
/// task so a slow or unresponsive device never stalls the encode loop that's still working
/// through the remaining tracks.
pub struct DeviceQueueBridge {
    adapter: Arc<dyn DeviceAdapter>,
    title: String,
    track_url: Box<dyn Fn(&Fingerprint, u32) -> String + Send + Sync>,
}

impl DeviceQueueBridge {
    pub fn new(
        adapter: Arc<dyn DeviceAdapter>,
        title: impl Into<String>,
        track_url: impl Fn(&Fingerprint, u32) -> String + Send + Sync + 'static,
    ) -> Self {
        DeviceQueueBridge { adapter, title: title.into(), track_url: Box::new(track_url) }
    }
}

impl QueueSink for DeviceQueueBridge {
    fn on_track_ready(&self, fingerprint: &Fingerprint, index: u32, _path: &Path) {
        let adapter = self.adapter.clone();
        let url = (self.track_url)(fingerprint, index);
        let title = format!("{} - track {}", self.title, index + 1);
        tokio::spawn(async move {
            adapter.queue(&url, &title).await;
        });
    }
}
