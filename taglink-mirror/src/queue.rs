use async_trait::async_trait;
use taglink_core::UploadIntent;

/// Durable storage for in-flight upload intents (§4.5, §4.9). Implemented by the persistence
/// layer; this crate only depends on the trait so it never touches a JSON file directly.
#[async_trait]
pub trait UploadQueueSink: Send + Sync {
    async fn save(&self, device_id: &str, intent: &UploadIntent);
    async fn clear(&self, device_id: &str);
    async fn load_all(&self) -> Vec<(String, UploadIntent)>;
}

/// No-op sink for tests and for callers that don't need restart-survival.
pub struct NullQueueSink;

#[async_trait]
impl UploadQueueSink for NullQueueSink {
    async fn save(&self, _device_id: &str, _intent: &UploadIntent) {}
    async fn clear(&self, _device_id: &str) {}
    async fn load_all(&self) -> Vec<(String, UploadIntent)> {
        Vec::new()
    }
}
