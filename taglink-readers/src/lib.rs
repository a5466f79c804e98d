//! Reader State Machine (§4.6): per-reader playback lifecycle and device-override resolution.

mod error;
mod state_machine;

pub use error::ReaderError;
pub use state_machine::{ReaderStateMachine, ScanOutcome};
