use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::device_client::DeviceFileClient;
use crate::error::MirrorError;

const CHUNK_SIZE: usize = 64 * 1024;
const PROGRESS_THROTTLE: Duration = Duration::from_millis(100);
const STALL_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BACKOFFS: [Duration; 3] =
    [Duration::from_secs(5), Duration::from_secs(10), Duration::from_secs(20)];

/// Progress snapshot delivered at most every 100ms during a file's transfer (§4.5 backpressure).
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub rate_bytes_per_sec: f64,
    pub eta_seconds: Option<f64>,
}

pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Per-transfer controls shared across retries of the same file.
#[derive(Clone)]
pub struct UploadOptions {
    pub rate_limit_bytes_per_sec: Option<u64>,
    pub cancel: Arc<AtomicBool>,
    pub progress: Option<ProgressSink>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions { rate_limit_bytes_per_sec: None, cancel: Arc::new(AtomicBool::new(false)), progress: None }
    }
}

/// Reads `local_path` under rate limiting and progress throttling, aborting on cancellation or a
/// 10s stall, then uploads the whole buffer to `dest_path`/`file_name` — retrying the entire file
/// up to 3 times with 5/10/20s exponential backoff on failure (§4.5).
pub async fn upload_with_retry(
    client: &DeviceFileClient,
    dest_path: &str,
    local_path: &Path,
    options: &UploadOptions,
) -> Result<(), MirrorError> {
    let mut last_error = None;
    for (attempt, backoff) in std::iter::once(Duration::ZERO).chain(RETRY_BACKOFFS).enumerate() {
        if attempt > 0 {
            warn!(file = %dest_path, attempt, backoff_secs = backoff.as_secs(), "retrying upload after failure");
            tokio::time::sleep(backoff).await;
        }
        match upload_once(client, dest_path, local_path, options).await {
            Ok(()) => return Ok(()),
            Err(MirrorError::Cancelled { path }) => return Err(MirrorError::Cancelled { path }),
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.unwrap_or_else(|| MirrorError::UploadFailed {
        path: dest_path.to_string(),
        reason: "exhausted retries".into(),
    }))
}

async fn upload_once(
    client: &DeviceFileClient,
    dest_path: &str,
    local_path: &Path,
    options: &UploadOptions,
) -> Result<(), MirrorError> {
    let metadata = tokio::fs::metadata(local_path)
        .await
        .map_err(|source| MirrorError::Io { path: local_path.display().to_string(), source })?;
    let total_bytes = metadata.len();

    let mut file = tokio::fs::File::open(local_path)
        .await
        .map_err(|source| MirrorError::Io { path: local_path.display().to_string(), source })?;

    let mut buffer = Vec::with_capacity(total_bytes as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let started_at = Instant::now();
    let mut last_progress_at = Instant::now();
    let mut last_emit_at = Instant::now() - PROGRESS_THROTTLE;

    loop {
        if options.cancel.load(Ordering::SeqCst) {
            return Err(MirrorError::Cancelled { path: dest_path.to_string() });
        }
        if last_progress_at.elapsed() >= STALL_TIMEOUT {
            return Err(MirrorError::Stalled { path: dest_path.to_string() });
        }

        let read = file
            .read(&mut chunk)
            .await
            .map_err(|source| MirrorError::Io { path: local_path.display().to_string(), source })?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        last_progress_at = Instant::now();

        if let Some(limit) = options.rate_limit_bytes_per_sec {
            if limit > 0 {
                let expected_elapsed = Duration::from_secs_f64(buffer.len() as f64 / limit as f64);
                let actual_elapsed = started_at.elapsed();
                if expected_elapsed > actual_elapsed {
                    tokio::time::sleep(expected_elapsed - actual_elapsed).await;
                }
            }
        }

        if let Some(sink) = &options.progress {
            if last_emit_at.elapsed() >= PROGRESS_THROTTLE {
                let elapsed_secs = started_at.elapsed().as_secs_f64().max(0.001);
                let rate = buffer.len() as f64 / elapsed_secs;
                let remaining = total_bytes.saturating_sub(buffer.len() as u64) as f64;
                let eta = if rate > 0.0 { Some(remaining / rate) } else { None };
                sink(UploadProgress {
                    bytes_uploaded: buffer.len() as u64,
                    total_bytes,
                    rate_bytes_per_sec: rate,
                    eta_seconds: eta,
                });
                last_emit_at = Instant::now();
            }
        }
    }

    if options.cancel.load(Ordering::SeqCst) {
        return Err(MirrorError::Cancelled { path: dest_path.to_string() });
    }

    client.upload(dest_path, buffer).await?;
    info!(file = %dest_path, bytes = total_bytes, "uploaded file to device");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_no_limits_and_are_not_cancelled() {
        let options = UploadOptions::default();
        assert!(options.rate_limit_bytes_per_sec.is_none());
        assert!(!options.cancel.load(Ordering::SeqCst));
    }
}
