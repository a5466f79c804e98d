use std::sync::Arc;

use taglink_cache::CacheStore;
use taglink_content::ContentClient;
use taglink_devices::DeviceRegistry;
use taglink_encoding::EncodingCoordinator;
use taglink_liveness::LivenessSupervisor;
use taglink_mirror::MirrorEngine;
use taglink_orchestrator::Orchestrator;
use taglink_persist::PersistenceStore;
use taglink_readers::ReaderStateMachine;
use taglink_server::{init_server, LoggingOptions};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1: persistence and ambient infrastructure ==========
    let persist = Arc::new(PersistenceStore::load(PersistenceStore::default_dir()).await?);
    let settings = persist.settings().await;

    let http_port: u16 = settings
        .http_bind
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8765);
    let local_ip = taglink_utils::guess_local_ip().unwrap_or_else(|| "127.0.0.1".to_string());
    let base_url = format!("http://{local_ip}:{http_port}");

    let server = init_server("taglink", &base_url, http_port);
    server.write().await.init_logging(LoggingOptions::default()).await;

    info!(%base_url, "📡 persistence loaded, server identity established");

    // ========== PHASE 2: domain components ==========
    let cache = Arc::new(CacheStore::new(dirs::cache_dir().unwrap_or_else(|| ".".into()).join("taglink"), settings.cache_cap_bytes));
    let encoding = Arc::new(EncodingCoordinator::new(cache.clone()));
    let content: Arc<dyn taglink_content::ContentPort> = Arc::new(ContentClient::new(settings.content_base_url.clone()));
    let devices = Arc::new(DeviceRegistry::new());
    let readers = Arc::new(ReaderStateMachine::new(devices.clone()));
    let liveness = Arc::new(LivenessSupervisor::new(devices.clone()));
    let mirror = Arc::new(MirrorEngine::new(devices.clone(), persist.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        encoding,
        content,
        devices,
        readers,
        liveness.clone(),
        mirror,
        persist,
        base_url.clone(),
    ));

    info!("🎛️  liveness supervisor starting");
    liveness.spawn();

    // ========== PHASE 3: HTTP surface (§6) ==========
    info!("🌐 mounting routes...");
    {
        let mut server = server.write().await;
        server.add_router("/", taglink_orchestrator::build_router(orchestrator)).await;
        server
            .add_route("/info", || async {
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "os": taglink_utils::os_summary(),
                })
            })
            .await;
        server.add_handler("/health", || async { "ok" }).await;
    }

    info!("🌐 starting HTTP server...");
    server.write().await.start().await;

    info!("✅ taglink is ready, press Ctrl+C to stop");
    server.write().await.wait().await;

    info!("✅ taglink stopped");
    Ok(())
}
