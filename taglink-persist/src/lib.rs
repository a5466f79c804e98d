//! Persistence (§4.9): five write-through JSON documents loaded once at startup.

mod atomic;
mod documents;
mod env;
mod error;
mod store;

pub use documents::{
    DeviceCacheDocument, DeviceCacheEntry, PreferencesDocument, ReaderCacheDocument, SettingsDocument,
    UploadQueueDocument,
};
pub use error::PersistError;
pub use store::PersistenceStore;
