//! Orchestrator (§4.8): wires a tag scan end to end across every other component, and exposes
//! the system's HTTP surface (§6) as a standalone router the application crate mounts.

mod error;
mod orchestrator;
mod progress_bridge;
mod queue_bridge;
pub mod routes;
mod types;

pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
pub use progress_bridge::SdProgressBridge;
pub use queue_bridge::DeviceQueueBridge;
pub use routes::build_router;
pub use types::{ControlAction, ScanRecord, ScanRequest, ScanResponse};
