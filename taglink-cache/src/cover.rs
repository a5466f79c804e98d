use crate::error::CacheError;
use crate::store::CacheStore;
use taglink_core::Fingerprint;
use tracing::{debug, warn};

const MAX_COVER_BYTES: u64 = 5 * 1024 * 1024;

/// Fetches and caches the cover image for a fingerprint, once.
///
/// Grounded on the reference implementation's one-cover-per-album fetch that runs ahead of
/// track encoding so `encode_track` can mux it in as an attached picture (§4.1, §4.2). A no-op
/// if a cover file is already present. Size-capped and content-type-gated to `image/*`; any
/// failure is non-fatal — the caller proceeds without a cover.
pub async fn fetch_cover(
    store: &CacheStore,
    fp: &Fingerprint,
    url: &str,
) -> Result<Option<std::path::PathBuf>, CacheError> {
    for ext in ["jpg", "png"] {
        let candidate = store.cover_path(fp, ext);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Ok(Some(candidate));
        }
    }

    store.ensure_dir(fp).await?;

    let response = match reqwest::get(url).await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            warn!(status = %r.status(), url, "cover fetch returned non-success status");
            return Ok(None);
        }
        Err(e) => {
            warn!(error = %e, url, "cover fetch request failed");
            return Ok(None);
        }
    };

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        debug!(content_type, "cover fetch skipped: not an image content-type");
        return Ok(None);
    }
    let ext = if content_type.contains("png") { "png" } else { "jpg" };

    if let Some(len) = response.content_length() {
        if len > MAX_COVER_BYTES {
            warn!(len, "cover fetch skipped: exceeds size cap");
            return Ok(None);
        }
    }

    let bytes = match response.bytes().await {
        Ok(b) if (b.len() as u64) <= MAX_COVER_BYTES => b,
        Ok(_) => {
            warn!("cover fetch skipped: body exceeded size cap");
            return Ok(None);
        }
        Err(e) => {
            warn!(error = %e, "cover fetch failed while reading body");
            return Ok(None);
        }
    };

    let out = store.cover_path(fp, ext);
    tokio::fs::write(&out, &bytes)
        .await
        .map_err(|source| CacheError::Io { path: out.clone(), source })?;
    Ok(Some(out))
}
