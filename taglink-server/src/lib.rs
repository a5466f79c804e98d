//! High-level Axum server abstraction used to expose the HTTP surface (§6).
//!
//! - [`server`]: router builder with a graceful Ctrl+C shutdown.
//! - [`logs`]: in-memory SSE log tail fed by a `tracing_subscriber::Layer`.

pub mod logs;
pub mod server;

pub use logs::{create_logs_router, init_logging, log_dump, log_sse, LogState, LoggingOptions, SseLayer};
pub use server::{Server, ServerBuilder, ServerInfo};

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single server instance shared across the application, initialized once via [`init_server`].
static GLOBAL_SERVER: OnceCell<Arc<RwLock<Server>>> = OnceCell::new();

/// Initializes the global server. Idempotent: later calls with different arguments are ignored
/// and the first-built instance is returned.
pub fn init_server(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Arc<RwLock<Server>> {
    GLOBAL_SERVER.get_or_init(|| Arc::new(RwLock::new(Server::new(name, base_url, http_port)))).clone()
}

/// Returns the global server if [`init_server`] has already run.
pub fn get_server() -> Option<Arc<RwLock<Server>>> {
    GLOBAL_SERVER.get().cloned()
}

/// The global server's base URL, without blocking if the lock happens to be busy.
pub fn get_server_base_url() -> Option<String> {
    GLOBAL_SERVER.get().map(|server| {
        if let Ok(srv) = server.try_read() {
            srv.base_url()
        } else {
            futures::executor::block_on(async { server.read().await.base_url() })
        }
    })
}
