//! SD Mirror Engine (§4.5): mirrors encoded albums onto SD-capable devices for local playback.

mod device_client;
mod engine;
mod error;
mod layout;
mod listing;
mod queue;
mod sanitize;
mod uploader;
mod verify;

pub use device_client::{DeviceFileClient, ListedFile};
pub use engine::MirrorEngine;
pub use error::MirrorError;
pub use layout::{
    album_folder_name, track_file_name, uid_suffix, AlbumIndex, TrackIndexEntry, UidMapEntry, UidMapFileEntry,
};
pub use queue::{NullQueueSink, UploadQueueSink};
pub use uploader::{ProgressSink, UploadOptions, UploadProgress};
pub use verify::{TrackStatus, TrackVerification, VerifyReport};
