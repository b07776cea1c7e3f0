//! Durable local storage for a device's dataset
//!
//! Provides:
//! - `BlobStore` backends holding one string document per key
//! - `LocalStore`, which (de)serializes the dataset, encrypting it on request
//! - Export and import of whole datasets as standalone documents

mod blob;
mod export;
mod local;

pub use blob::{BlobStore, FileStore, MemoryStore, StorageError};
pub use export::{export, export_file_name, import, ExportDocument, ImportError, EXPORT_TYPE};
pub use local::{migrate_v1, LoadError, LocalStore, CURRENT_KEY, LEGACY_KEY};
