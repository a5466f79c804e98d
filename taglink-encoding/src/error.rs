use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("cache error: {0}")]
    Cache(#[from] taglink_cache::CacheError),

    #[error("transcode error: {0}")]
    Transcode(#[from] taglink_transcode::TranscodeError),

    #[error("encoding stalled: no progress for {0:?}")]
    Stalled(std::time::Duration),

    #[error("no tracks supplied for album")]
    EmptyAlbum,
}
