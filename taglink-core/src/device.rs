use serde::{Deserialize, Serialize};

/// The kind of playback endpoint a [`DeviceDescriptor`] names.
///
/// Mirrors the backend split in `taglink-devices`'s `DeviceAdapter` dispatch (§4.4); kept in
/// `taglink-core` so the Reader State Machine and Orchestrator can reason about device kind
/// without depending on the adapter implementations themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    SdPlayer,
    Multiroom,
    Cast,
    AirplayLike,
    Browser,
}

/// A playback endpoint known to the system.
///
/// `id` meaning varies by kind: a network address for `Multiroom`/`Cast`/`AirplayLike`, an
/// opaque reader-ip-derived identifier for `SdPlayer`, and a session id for `Browser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub id: String,
    pub display_name: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(kind: DeviceKind, id: impl Into<String>) -> Self {
        DeviceDescriptor { kind, id: id.into(), display_name: None }
    }
}
