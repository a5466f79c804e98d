use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("encoding failed: {0}")]
    Encoding(#[from] taglink_encoding::EncodingError),

    #[error("persistence failed: {0}")]
    Persist(#[from] taglink_persist::PersistError),
}
