//! High-level Axum server abstraction: a router builder plus an SSE log feed, with the domain
//! HTTP surface (§6) mounted onto it as a standalone router by the application crate.

use crate::logs::{init_logging, log_dump, log_sse, LogState, LoggingOptions};
use axum::handler::Handler;
use axum::response::Redirect;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::info;

/// Serializable server identity, served at `GET /info`.
#[derive(Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Owns the live `Router` and the background serve/shutdown tasks.
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

impl Server {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Server {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    /// Adds a dynamic JSON route: the closure runs on every `GET` to `path`.
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = {
            let f = f.clone();
            move || {
                let f = f.clone();
                async move { Json(f().await) }
            }
        };
        let route = Router::new().route("/", get(handler));
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Merges (absolute path) or nests (relative path) a standalone router — how a domain
    /// crate's own `build_router()` is mounted without this crate depending on it.
    pub async fn add_router(&mut self, path: &str, route: Router) {
        let mut r = self.router.write().await;
        let current = std::mem::take(&mut *r);
        *r = if path.starts_with('/') {
            tracing::debug!(path, "merging router at root path");
            current.merge(route)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            tracing::debug!(path = %normalized, "nesting router");
            current.nest(&normalized, route)
        };
    }

    /// Adds a bare Axum handler with no extractor state.
    pub async fn add_handler<H, T>(&mut self, path: &str, handler: H)
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let route = Router::new().route("/", get(handler));
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a `GET` handler carrying its own state — used for the SSE log feed.
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Adds a `POST` handler carrying its own state.
    pub async fn add_post_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", axum::routing::post(handler)).with_state(state);
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).nest(path, route);
    }

    /// Permanent (308) redirect from `from` to `to`.
    pub async fn add_redirect(&mut self, from: &str, to: &str) {
        let to = to.to_string();
        let handler = move || {
            let to = to.clone();
            async move { Redirect::permanent(&to) }
        };
        let mut r = self.router.write().await;
        let route = Router::new().route("/", get(handler));
        *r = if from == "/" { std::mem::take(&mut *r).merge(route) } else { std::mem::take(&mut *r).nest(from, route) };
    }

    /// Installs the global tracing subscriber (console + SSE mirror) and registers `/logs/stream`
    /// and `/logs/dump` under this server.
    pub async fn init_logging(&mut self, options: LoggingOptions) {
        let log_state = init_logging(options);
        self.add_handler_with_state("/logs/stream", log_sse, log_state.clone()).await;
        self.add_handler_with_state("/logs/dump", log_dump, log_state.clone()).await;
        self.log_state = Some(log_state);
    }

    /// Binds the configured port and serves until Ctrl+C.
    pub async fn start(&mut self) {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        info!(name = %self.name, %addr, "server starting");

        let router = self.router.clone();
        let server_task = tokio::spawn(async move {
            let r = router.read().await.clone();
            let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind http listener");
            if let Err(error) = axum::serve(listener, r.into_make_service()).await {
                tracing::error!(%error, "server exited with error");
            }
        });

        let shutdown_task = tokio::spawn(async move {
            signal::ctrl_c().await.expect("failed to listen for ctrl_c");
            info!("ctrl-c received, shutting down");
        });

        self.join_handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = server_task => {},
                _ = shutdown_task => {},
            }
        }));
    }

    /// Blocks until the server task (started by [`Server::start`]) exits.
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    pub fn info(&self) -> ServerInfo {
        ServerInfo { name: self.name.clone(), base_url: self.base_url.clone(), http_port: self.http_port }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        ServerBuilder { name: name.into(), base_url: base_url.into(), http_port }
    }

    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}
