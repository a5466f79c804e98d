//! In-memory log backlog plus an SSE tail, fed by a `tracing_subscriber::Layer` so every
//! component's `tracing` events reach the `/logs/stream` and `/logs/dump` routes (§6) without
//! those components knowing an HTTP layer exists.

mod sselayer;

pub use sselayer::SseLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock},
    time::SystemTime,
};

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// One tracing event, flattened for JSON/SSE transport.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Shared circular backlog plus the broadcast channel new entries are published on.
#[derive(Clone)]
pub struct LogState {
    buffer: Arc<RwLock<VecDeque<LogEntry>>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogState {
    pub fn new(capacity: usize) -> Self {
        LogState {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.max(1)))),
            tx: broadcast::channel(1000).0,
        }
    }

    fn push(&self, entry: LogEntry) {
        let mut buf = self.buffer.write().unwrap();
        if buf.len() == buf.capacity() {
            buf.pop_front();
        }
        buf.push_back(entry.clone());
        let _ = self.tx.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        self.buffer.read().unwrap().iter().cloned().collect()
    }
}

/// Options accepted by [`init_logging`] (§6 CLI/env: log level, SSE buffer capacity).
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub env_filter: String,
    pub buffer_capacity: usize,
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        LoggingOptions { env_filter: "info".to_string(), buffer_capacity: 1000, enable_console: true }
    }
}

/// Installs the global tracing subscriber — an `EnvFilter`-driven fmt layer plus the SSE mirror
/// layer — and returns the [`LogState`] the `/logs/stream` and `/logs/dump` routes read from.
/// Panics if a global subscriber is already installed; call this exactly once at startup.
pub fn init_logging(options: LoggingOptions) -> LogState {
    let state = LogState::new(options.buffer_capacity);
    let filter = EnvFilter::try_new(&options.env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(SseLayer::new(state.clone()));

    if options.enable_console {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.init();
    }

    state
}

/// Query params accepted by `/logs/stream`: level filters (any-of, no flags means all levels)
/// plus a substring search over message/target.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub error: Option<bool>,
    #[serde(default)]
    pub warn: Option<bool>,
    #[serde(default)]
    pub info: Option<bool>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub trace: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

/// `GET /logs/stream`: the backlog first, then every new entry as it's logged.
pub async fn log_sse(
    State(state): State<LogState>,
    Query(params): Query<LogQuery>,
) -> impl IntoResponse {
    let mut rx = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in history {
            if !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }

        while let Ok(entry) = rx.recv().await {
            if !filter_entry(&entry, &params) {
                continue;
            }
            if let Ok(json) = serde_json::to_string(&entry) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /logs/dump`: the backlog as a single JSON array, for non-streaming clients.
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

fn filter_entry(entry: &LogEntry, q: &LogQuery) -> bool {
    let level = entry.level.to_lowercase();
    let any_level_flag =
        q.error.unwrap_or(false) || q.warn.unwrap_or(false) || q.info.unwrap_or(false) || q.debug.unwrap_or(false) || q.trace.unwrap_or(false);

    let mut allowed = !any_level_flag;
    if let Some(true) = q.error {
        allowed |= level == "error";
    }
    if let Some(true) = q.warn {
        allowed |= level == "warn";
    }
    if let Some(true) = q.info {
        allowed |= level == "info";
    }
    if let Some(true) = q.debug {
        allowed |= level == "debug";
    }
    if let Some(true) = q.trace {
        allowed |= level == "trace";
    }

    if let Some(search) = &q.search {
        allowed &= entry.message.contains(search) || entry.target.contains(search);
    }
    allowed
}

/// Standalone `/stream` + `/dump` router over a [`LogState`], mounted by the application crate
/// under `/logs`.
pub fn create_logs_router(state: LogState) -> Router {
    Router::new().route("/stream", get(log_sse)).route("/dump", get(log_dump)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_level_flags_allows_everything() {
        let entry = LogEntry { timestamp: SystemTime::now(), level: "info".into(), target: "x".into(), message: "hi".into() };
        let query = LogQuery { error: None, warn: None, info: None, debug: None, trace: None, search: None };
        assert!(filter_entry(&entry, &query));
    }

    #[test]
    fn level_flag_excludes_other_levels() {
        let entry = LogEntry { timestamp: SystemTime::now(), level: "debug".into(), target: "x".into(), message: "hi".into() };
        let query = LogQuery { error: Some(true), warn: None, info: None, debug: None, trace: None, search: None };
        assert!(!filter_entry(&entry, &query));
    }

    #[test]
    fn search_matches_message_substring() {
        let entry = LogEntry { timestamp: SystemTime::now(), level: "info".into(), target: "x".into(), message: "upload complete".into() };
        let query = LogQuery { error: None, warn: None, info: None, debug: None, trace: None, search: Some("complete".into()) };
        assert!(filter_entry(&entry, &query));
    }

    #[test]
    fn backlog_evicts_oldest_past_capacity() {
        let state = LogState::new(2);
        for i in 0..3 {
            state.push(LogEntry { timestamp: SystemTime::now(), level: "info".into(), target: "x".into(), message: format!("{i}") });
        }
        let dumped = state.dump();
        assert_eq!(dumped.len(), 2);
        assert_eq!(dumped[0].message, "1");
        assert_eq!(dumped[1].message, "2");
    }
}
