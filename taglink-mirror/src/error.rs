use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("upload of {path} failed: {reason}")]
    UploadFailed { path: String, reason: String },
    #[error("upload of {path} cancelled")]
    Cancelled { path: String },
    #[error("upload of {path} stalled")]
    Stalled { path: String },
    #[error("no active upload intent for device {0}")]
    NoActiveIntent(String),
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("verification could not read folder listing for {0}")]
    UnreadableListing(String),
}
