use taglink_core::Fingerprint;

/// Receives best-effort progress notifications as an album encodes.
///
/// Kept device-agnostic deliberately (§4.3): when a scan originated from an SD-capable reader,
/// the orchestrator wires an implementation that also forwards each percentage to that device's
/// own `cacheprogress` endpoint, rather than the Coordinator special-casing device kinds.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fingerprint: &Fingerprint, percent: u8);
}

/// A sink that discards every update; used when no caller cares about progress.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _fingerprint: &Fingerprint, _percent: u8) {}
}
