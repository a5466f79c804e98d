use thiserror::Error;

/// Failure modes surfaced internally by an adapter implementation.
///
/// Per §4.4's failure model, these never cross the [`DeviceAdapter`](crate::adapter::DeviceAdapter)
/// boundary as a `Result::Err` for the transport-control operations: those return `bool` and log
/// at `warn` on any `DeviceError`. The exceptions are `seek`, which surfaces `Unsupported`
/// explicitly (§9 open question #2), and `active_tag`, consumed only by the Liveness Supervisor.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {0} unreachable: {1}")]
    Unreachable(String, String),
    #[error("device {0} returned an unexpected response: {1}")]
    BadResponse(String, String),
    #[error("operation not supported by this device kind")]
    Unsupported,
    #[error("device id {0} did not resolve to a known endpoint")]
    UnknownDevice(String),
    #[error("connection to {0} failed: {1}")]
    Connection(String, String),
}
