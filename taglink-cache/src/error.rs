use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("fingerprint directory not found: {0}")]
    NotFound(String),

    #[error("album metadata not present for fingerprint: {0}")]
    MetadataMissing(String),

    #[error("track index {index} out of range for fingerprint {fingerprint}")]
    TrackOutOfRange { fingerprint: String, index: u32 },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cover fetch failed: {0}")]
    CoverFetch(String),

    #[error("could not free enough cache space for {requested_bytes} bytes (freed {freed_bytes})")]
    InsufficientSpace { requested_bytes: u64, freed_bytes: u64 },
}
