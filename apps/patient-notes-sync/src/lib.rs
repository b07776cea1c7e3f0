//! Patient Notes
//!
//! Local-first patient notes with optional encryption at rest and
//! password-gated group sharing between devices.
//!
//! # Modules
//!
//! - `records`: patients, notes and the dataset that holds them
//! - `crypto`: password-derived envelope encryption and group password hashes
//! - `storage`: the device-local store, schema migration and export files
//! - `sync`: merging, subset shares, payload decoding and the group API client
//! - `groups`: the server-side group store with versioned writes
//! - `routes`: the HTTP surface of the group server
//! - `session`: a device session tying the pieces together

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod groups;
pub mod records;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
