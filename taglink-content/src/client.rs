use crate::error::ContentError;
use crate::model::TagIndexEntry;
use async_trait::async_trait;
use tracing::debug;

/// Operations this system needs from the upstream content service (§6): tag-index lookup,
/// recursive library listing, and `lib://` URL rewriting.
#[async_trait]
pub trait ContentPort: Send + Sync {
    /// Resolves a tag by matching on the last 8 hex digits of its UID, since a physical reader
    /// only ever transmits a 4-byte suffix.
    async fn lookup_tag(&self, uid_suffix: &str) -> Result<TagIndexEntry, ContentError>;

    /// Lists library file paths known to the content service.
    async fn list_library(&self) -> Result<Vec<String>, ContentError>;

    /// Rewrites a `lib://...` reference into a fetchable content URL.
    fn resolve_library_url(&self, lib_path: &str) -> String;
}

/// HTTP-backed [`ContentPort`] implementation.
pub struct ContentClient {
    base_url: String,
    http: reqwest::Client,
}

impl ContentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ContentClient { base_url: base_url.into(), http: reqwest::Client::new() }
    }
}

#[async_trait]
impl ContentPort for ContentClient {
    async fn lookup_tag(&self, uid_suffix: &str) -> Result<TagIndexEntry, ContentError> {
        let suffix = uid_suffix.to_uppercase();
        debug!(uid_suffix = %suffix, "looking up tag on content port");
        let url = format!("{}/tags/{}", self.base_url, suffix);
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(suffix));
        }
        let entry: TagIndexEntry = response.error_for_status()?.json().await?;
        Ok(entry)
    }

    async fn list_library(&self) -> Result<Vec<String>, ContentError> {
        let url = format!("{}/library", self.base_url);
        let paths: Vec<String> = self.http.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(paths)
    }

    fn resolve_library_url(&self, lib_path: &str) -> String {
        resolve_library_url(&self.base_url, lib_path)
    }
}

/// Rewrites `lib://some path/track.mp3` into `{base}/library?path=some%20path/track.mp3&ogg=true&special=library`,
/// percent-encoding spaces but preserving path separators, matching the reference implementation.
fn resolve_library_url(base_url: &str, lib_path: &str) -> String {
    let stripped = lib_path.strip_prefix("lib://").unwrap_or(lib_path);
    let encoded = stripped.replace(' ', "%20");
    format!("{base_url}/library?path={encoded}&ogg=true&special=library")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_lib_scheme_with_query_params() {
        let url = resolve_library_url("https://content.example", "lib://Folder/Track One.mp3");
        assert_eq!(
            url,
            "https://content.example/library?path=Folder/Track%20One.mp3&ogg=true&special=library"
        );
    }

    #[test]
    fn leaves_non_lib_paths_untouched_aside_from_encoding() {
        let url = resolve_library_url("https://content.example", "Folder/Track.mp3");
        assert_eq!(
            url,
            "https://content.example/library?path=Folder/Track.mp3&ogg=true&special=library"
        );
    }
}
