//! Client for the upstream content API that resolves tag UIDs to audio and library paths (§6).
//!
//! Generalizes `pmosource::MusicSource`'s pluggable-backend shape (name/id/default-image) to the
//! single upstream content service this system talks to, rather than the teacher's multi-source
//! radio aggregator.

mod client;
mod error;
mod model;

pub use client::{ContentClient, ContentPort};
pub use error::ContentError;
pub use model::{TagIndexEntry, TonieInfo};
