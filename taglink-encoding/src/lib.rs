//! Deduplicates concurrent encode requests per fingerprint and drives progressive
//! first-track-then-rest scheduling (§4.3).
//!
//! Grounded on `pmoaudiocache::cache`'s `new_cache_with_consolidation` background-task idiom
//! for the shape of "spawn a task that keeps working after the caller stops awaiting it"; the
//! FLAC-streaminfo parsing that crate built its dedup around is dropped entirely since output
//! here is always MP3 produced by `taglink-transcode`. Status machine and progressive-unlock
//! semantics are a direct port of the reference implementation's
//! `encode_first_track`/`continue_encoding_remaining_tracks`.

mod coordinator;
mod error;
mod progress;

pub use coordinator::{AlbumTags, EncodingCoordinator, QueueSink};
pub use error::EncodingError;
pub use progress::{NullProgressSink, ProgressSink};
