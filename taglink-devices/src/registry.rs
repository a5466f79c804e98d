use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use taglink_core::{DeviceDescriptor, DeviceKind};

use crate::adapter::DeviceAdapter;
use crate::airplay::AirplayLikeAdapter;
use crate::browser::BrowserAdapter;
use crate::cast::{new_cast_adapter, CastAdapter};
use crate::multiroom::MultiroomAdapter;
use crate::sd_player::SdPlayerAdapter;

/// Process-wide table of live adapter instances, keyed by device id. Long-lived kinds (`Cast`,
/// `AirplayLike`) keep one cached connection per id; a broken one is evicted here and rebuilt
/// on next lookup (§4.4, §5 "shared resources").
#[derive(Default)]
pub struct DeviceRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn DeviceAdapter>>>,
    sd_players: RwLock<HashMap<String, Arc<SdPlayerAdapter>>>,
    cast_adapters: RwLock<HashMap<String, Arc<CastAdapter>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry::default()
    }

    /// Resolves (lazily constructing if absent) the adapter for a descriptor.
    pub async fn resolve(&self, descriptor: &DeviceDescriptor) -> Arc<dyn DeviceAdapter> {
        if let Some(existing) = self.adapters.read().await.get(&descriptor.id) {
            return existing.clone();
        }
        let adapter: Arc<dyn DeviceAdapter> = match descriptor.kind {
            DeviceKind::SdPlayer => {
                let sd = Arc::new(SdPlayerAdapter::new(descriptor.id.clone()));
                self.sd_players.write().await.insert(descriptor.id.clone(), sd.clone());
                sd
            }
            DeviceKind::Multiroom => {
                let multiroom = Arc::new(MultiroomAdapter::new(descriptor.id.clone()));
                multiroom.spawn_queue_advancer();
                multiroom
            }
            DeviceKind::Cast => {
                let cast = new_cast_adapter(descriptor.id.clone(), None);
                self.cast_adapters.write().await.insert(descriptor.id.clone(), cast.clone());
                cast
            }
            DeviceKind::AirplayLike => Arc::new(AirplayLikeAdapter::new(descriptor.id.clone())),
            DeviceKind::Browser => Arc::new(BrowserAdapter::new()),
        };
        info!(id = %descriptor.id, kind = ?descriptor.kind, "constructed device adapter");
        self.adapters.write().await.insert(descriptor.id.clone(), adapter.clone());
        adapter
    }

    /// Returns the concrete SD-player adapter for a reader ip, if one has been constructed.
    /// Used by the Liveness Supervisor (§4.7) and SD Mirror Engine (§4.5), which both need
    /// SD-player-specific operations beyond the uniform [`DeviceAdapter`] surface.
    pub async fn sd_player(&self, id: &str) -> Arc<SdPlayerAdapter> {
        if let Some(existing) = self.sd_players.read().await.get(id) {
            return existing.clone();
        }
        let sd = Arc::new(SdPlayerAdapter::new(id.to_string()));
        self.sd_players.write().await.insert(id.to_string(), sd.clone());
        sd
    }

    /// Evicts a cached long-lived connection so the next `resolve` rebuilds it (§5).
    pub async fn evict(&self, id: &str) {
        self.adapters.write().await.remove(id);
        self.cast_adapters.write().await.remove(id);
    }
}
