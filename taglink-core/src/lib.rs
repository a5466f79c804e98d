//! Shared data model for the TagLink reader/device orchestration hub.
//!
//! Every other crate in the workspace depends on this one; it carries no behavior beyond
//! construction helpers and fingerprint derivation, so it can sit at the bottom of the
//! dependency graph without pulling in I/O.

mod device;
mod fingerprint;
mod reader;
mod track;
mod upload;

pub use device::{DeviceDescriptor, DeviceKind};
pub use fingerprint::Fingerprint;
pub use reader::{ReaderDescriptor, ReaderState, ResumeRecord, ScanMode, TagSnapshot};
pub use track::{AlbumMetadata, EncodingStatus, Track};
pub use upload::{UploadIntent, UploadTrack};
