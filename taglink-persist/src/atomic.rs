use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::PersistError;

/// Loads a JSON document, returning `T::default()` if the file does not yet exist.
pub async fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PersistError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|source| PersistError::Malformed { path: path.display().to_string(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(PersistError::Io { path: path.display().to_string(), source }),
    }
}

/// Writes a JSON document to a temp file in the same directory, then renames it into place, so
/// a crash mid-write never leaves a half-written document (§4.9 "written atomically on change").
pub async fn save_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistError::Io { path: parent.display().to_string(), source })?;
    }
    let body = serde_json::to_vec_pretty(value)
        .map_err(|source| PersistError::Malformed { path: path.display().to_string(), source })?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|source| PersistError::Io { path: tmp_path.display().to_string(), source })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| PersistError::Io { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        let loaded: Sample = load_or_default(&path).await.unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[tokio::test]
    async fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        save_atomic(&path, &Sample { value: 42 }).await.unwrap();
        let loaded: Sample = load_or_default(&path).await.unwrap();
        assert_eq!(loaded, Sample { value: 42 });
    }
}
