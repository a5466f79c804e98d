use async_trait::async_trait;
use taglink_core::DeviceDescriptor;

use crate::error::DeviceError;

/// Detailed transport state, reported by kinds whose protocol exposes one (§4.4 table:
/// Multi-room and Cast are "detailed"; the others report `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Buffering,
}

/// Current playback position, in seconds, as last reported by the device (or the client, for
/// `Browser`). `duration` is `None` when the device does not expose track length.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionInfo {
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
}

/// Uniform operations across the five endpoint kinds (§4.4).
///
/// Every operation here is best-effort: underlying transport/protocol errors are logged by the
/// implementation and surfaced to the caller as `false` (or `None` for reads), never as a
/// propagated error, matching §4.4's failure model and §7's device-error propagation policy.
/// `seek` is the one exception — it returns a `Result` so a caller can distinguish "the device
/// rejected/doesn't support seeking" from "attempted and failed" (§9 open question #2).
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Starts (or restarts) playback of a single URL. `start` is an optional seek-on-start
    /// offset in seconds.
    async fn play(&self, url: &str, title: &str, start: Option<f64>) -> bool;

    /// Replaces the device's queue with `urls` and starts playback from the first entry.
    /// Kinds without a playlist primitive (`SdPlayer`, `AirplayLike`, `Browser`) play only the
    /// first URL, matching the §4.4 table.
    async fn play_list(&self, urls: &[String], title: &str) -> bool;

    /// Appends one URL to the end of the device's queue without interrupting current playback.
    /// No-op (`false`) for kinds that don't support queueing (`SdPlayer`, `AirplayLike`,
    /// `Browser`).
    async fn queue(&self, url: &str, title: &str) -> bool;

    async fn pause(&self) -> bool;
    async fn resume(&self) -> bool;
    async fn stop(&self) -> bool;

    /// Seeks to an absolute offset in seconds. `Err(DeviceError::Unsupported)` for kinds that
    /// expose no seek primitive (`SdPlayer`, `AirplayLike`, `Browser`).
    async fn seek(&self, position_seconds: f64) -> Result<(), DeviceError>;

    /// Current playback position, when the device/kind can report one. `SdPlayer` position is
    /// documented as unreliable (§4.4); `AirplayLike` reports none.
    async fn position(&self) -> Option<PositionInfo>;

    /// Detailed transport state, for kinds that expose one.
    async fn transport_state(&self) -> Option<TransportState>;
}

/// One concrete adapter instance per known device, keyed by [`DeviceDescriptor`] in the
/// Orchestrator's device registry. `kind` is kept alongside the trait object so callers that
/// need kind-specific branching (e.g. the Liveness Supervisor's SD-player-only probe) don't have
/// to downcast.
pub struct AdapterHandle {
    pub descriptor: DeviceDescriptor,
    pub adapter: std::sync::Arc<dyn DeviceAdapter>,
}
