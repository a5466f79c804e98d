use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("malformed document at {path}: {source}")]
    Malformed { path: String, #[source] source: serde_json::Error },
}
