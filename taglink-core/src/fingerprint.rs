use sha2::{Digest, Sha256};
use std::fmt;

/// A stable, opaque key for a piece of resolved source audio, derived from its URL.
///
/// Two scans that resolve to the same URL always produce the same fingerprint; this is the
/// cache-directory name and the coordination key for the Encoding Coordinator and the SD Mirror
/// Engine. Collisions are treated as identity, matching the reference implementation which
/// truncates a full SHA-256 digest to 16 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derives a fingerprint from a source URL: `sha256(url)`, first 16 hex characters.
    pub fn of_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        let hex = format!("{digest:x}");
        Fingerprint(hex[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstructs a fingerprint from a value already known to be one — e.g. a cache
    /// directory name read back off disk. Does not re-derive or validate the hash; callers are
    /// trusted to pass back a value this type itself produced.
    pub fn from_existing(value: impl Into<String>) -> Self {
        Fingerprint(value.into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_same_fingerprint() {
        let a = Fingerprint::of_url("https://content.example/albums/1");
        let b = Fingerprint::of_url("https://content.example/albums/1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_url_different_fingerprint() {
        let a = Fingerprint::of_url("https://content.example/albums/1");
        let b = Fingerprint::of_url("https://content.example/albums/2");
        assert_ne!(a, b);
    }

    #[test]
    fn is_sixteen_hex_chars() {
        let fp = Fingerprint::of_url("https://content.example/albums/1");
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
