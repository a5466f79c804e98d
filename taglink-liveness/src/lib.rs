//! Liveness Supervisor (§4.7): periodic SD-player probing and stale-stream reaping.

mod streams;
mod supervisor;
mod tag_id;

pub use streams::{StreamEntry, StreamRegistry};
pub use supervisor::LivenessSupervisor;
pub use tag_id::derive_device_tag_id;
