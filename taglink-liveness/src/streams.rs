use std::collections::HashMap;

use chrono::{DateTime, Utc};
use taglink_core::ReaderDescriptor;

/// A live SD-player stream this supervisor tracks for staleness (§4.7, §4.8).
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub reader_ip: String,
    pub device_id: String,
    pub uid: String,
    pub last_seen: DateTime<Utc>,
}

/// Tracks one entry per reader with an active SD-player stream. Not a general reader directory —
/// that is the Persistence layer's reader cache; this is purely the liveness-tracked subset.
#[derive(Default)]
pub struct StreamRegistry {
    entries: HashMap<String, StreamEntry>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        StreamRegistry::default()
    }

    pub fn register(&mut self, reader_ip: &str, device_id: &str, uid: &str) {
        self.entries.insert(
            reader_ip.to_string(),
            StreamEntry {
                reader_ip: reader_ip.to_string(),
                device_id: device_id.to_string(),
                uid: uid.to_string(),
                last_seen: Utc::now(),
            },
        );
    }

    pub fn touch(&mut self, reader_ip: &str) -> bool {
        match self.entries.get_mut(reader_ip) {
            Some(entry) => {
                entry.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, reader_ip: &str) -> Option<StreamEntry> {
        self.entries.remove(reader_ip)
    }

    pub fn get(&self, reader_ip: &str) -> Option<StreamEntry> {
        self.entries.get(reader_ip).cloned()
    }

    pub fn active(&self) -> Vec<StreamEntry> {
        self.entries.values().cloned().collect()
    }

    /// Forcibly clears any stream whose `last_seen` is older than `cutoff_seconds`. Virtual
    /// readers (§3) are exempt since they have no physical liveness to track.
    pub fn reap_stale(&mut self, cutoff_seconds: i64) -> Vec<StreamEntry> {
        let now = Utc::now();
        let stale_ips: Vec<String> = self
            .entries
            .values()
            .filter(|entry| !ReaderDescriptor::is_virtual(&entry.reader_ip))
            .filter(|entry| (now - entry.last_seen).num_seconds() >= cutoff_seconds)
            .map(|entry| entry.reader_ip.clone())
            .collect();
        stale_ips.iter().filter_map(|ip| self.entries.remove(ip)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_non_virtual_stream_is_reaped() {
        let mut registry = StreamRegistry::new();
        registry.register("192.168.1.20", "sd-192.168.1.20", "AABBCCDD");
        if let Some(entry) = registry.entries.get_mut("192.168.1.20") {
            entry.last_seen = Utc::now() - Duration::seconds(200);
        }
        let reaped = registry.reap_stale(180);
        assert_eq!(reaped.len(), 1);
        assert!(registry.get("192.168.1.20").is_none());
    }

    #[test]
    fn fresh_stream_survives_reap() {
        let mut registry = StreamRegistry::new();
        registry.register("192.168.1.20", "sd-192.168.1.20", "AABBCCDD");
        let reaped = registry.reap_stale(180);
        assert!(reaped.is_empty());
        assert!(registry.get("192.168.1.20").is_some());
    }

    #[test]
    fn virtual_reader_is_exempt_from_reaping() {
        let mut registry = StreamRegistry::new();
        registry.register("browser-session", "browser", "AABBCCDD");
        if let Some(entry) = registry.entries.get_mut("browser-session") {
            entry.last_seen = Utc::now() - Duration::seconds(999);
        }
        let reaped = registry.reap_stale(180);
        assert!(reaped.is_empty());
    }
}
