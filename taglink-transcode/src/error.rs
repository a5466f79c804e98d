use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg exited with status {status}: {stderr_tail}")]
    EncodeFailed { status: i32, stderr_tail: String },

    #[error("ffmpeg timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("ffmpeg/ffprobe not found on PATH")]
    ToolMissing,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
