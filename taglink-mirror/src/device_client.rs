use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::MirrorError;
use crate::listing::extract_json_array;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_UPLOAD_TIMEOUT_SECONDS: f64 = 180.0;
const UPLOAD_SECONDS_PER_MB: f64 = 90.0;

/// A generous, size-scaled timeout for track uploads: ESPuino SD writes run ~300-500KB/s, so a
/// flat timeout starves large files. 90s/MB, floored at 180s.
fn upload_timeout(byte_len: usize) -> Duration {
    let megabytes = byte_len as f64 / (1024.0 * 1024.0);
    Duration::from_secs_f64((megabytes * UPLOAD_SECONDS_PER_MB).max(MIN_UPLOAD_TIMEOUT_SECONDS))
}

/// One entry the device's `/explorer` listing reports for a path.
#[derive(Debug, Clone, Deserialize)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
}

/// Raw file-explorer surface of an SD-capable device (§4.5). Distinct from
/// [`taglink_devices::SdPlayerAdapter`], which covers the playback-control half of the same
/// device's HTTP API; this client only ever touches its folder/file operations.
pub struct DeviceFileClient {
    base_url: String,
    http: reqwest::Client,
}

impl DeviceFileClient {
    pub fn new(ip: impl Into<String>) -> Self {
        let http = reqwest::Client::builder().build().unwrap_or_default();
        DeviceFileClient { base_url: format!("http://{}", ip.into()), http }
    }

    /// Lists a folder's immediate files. Tolerates the device appending junk after the JSON
    /// array in its response body.
    pub async fn list(&self, path: &str) -> Result<Vec<ListedFile>, MirrorError> {
        let url = format!("{}/explorer?path={}", self.base_url, urlencode(path));
        let response = self
            .http
            .get(&url)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| MirrorError::UnreadableListing(e.to_string()))?;
        let body = response.text().await.map_err(|e| MirrorError::UnreadableListing(e.to_string()))?;
        let array = extract_json_array(&body).ok_or_else(|| MirrorError::UnreadableListing(path.to_string()))?;
        serde_json::from_str(array).map_err(|e| MirrorError::UnreadableListing(e.to_string()))
    }

    /// Reads a whole file's bytes, used to recover `metadata.json`/the UID map without trusting
    /// the directory listing's sizes.
    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        let url = format!("{}/explorer/file?path={}", self.base_url, urlencode(path));
        let response = self.http.get(&url).timeout(DEFAULT_HTTP_TIMEOUT).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.bytes().await.ok().map(|b| b.to_vec())
    }

    /// Creates each path segment idempotently. The device is expected to no-op on an existing
    /// directory.
    pub async fn ensure_dir(&self, path: &str) -> bool {
        let mut built = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            built.push('/');
            built.push_str(segment);
            let url = format!("{}/explorer/mkdir?path={}", self.base_url, urlencode(&built));
            if let Err(error) = self.http.post(&url).timeout(DEFAULT_HTTP_TIMEOUT).send().await {
                warn!(%error, path = %built, "mkdir failed");
                return false;
            }
        }
        true
    }

    /// Uploads one file's full contents via multipart POST to its full destination path. The
    /// request timeout scales with the file's size rather than using the default, since SD
    /// writes of large tracks routinely run well past it.
    pub async fn upload(&self, dest_path: &str, bytes: Vec<u8>) -> Result<(), MirrorError> {
        let url = format!("{}/explorer?path={}", self.base_url, urlencode(dest_path));
        let file_name = dest_path.rsplit('/').next().unwrap_or(dest_path).to_string();
        let timeout = upload_timeout(bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| MirrorError::UploadFailed { path: dest_path.to_string(), reason: e.to_string() })?;
        if !response.status().is_success() {
            return Err(MirrorError::UploadFailed {
                path: dest_path.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> bool {
        let url = format!("{}/explorer?path={}", self.base_url, urlencode(path));
        self.http
            .delete(&url)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_timeout_floors_small_files_at_180_seconds() {
        assert_eq!(upload_timeout(1024), Duration::from_secs_f64(180.0));
    }

    #[test]
    fn upload_timeout_scales_with_file_size() {
        let ten_mb = 10 * 1024 * 1024;
        assert_eq!(upload_timeout(ten_mb), Duration::from_secs_f64(900.0));
    }
}

fn urlencode(path: &str) -> String {
    path.replace(' ', "%20")
}
