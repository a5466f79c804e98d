use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content port request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("tag not found for uid suffix: {0}")]
    NotFound(String),

    #[error("content port response could not be parsed: {0}")]
    Schema(#[from] serde_json::Error),
}
