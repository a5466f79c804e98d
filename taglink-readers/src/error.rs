use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("unknown reader {0}")]
    UnknownReader(String),
}
