//! Sync module for multi-device sharing through a group
//!
//! Provides:
//! - Last-write-wins reconciliation of a local and an incoming dataset
//! - Subset shares restricted to chosen patients
//! - Decoding of every payload shape a group may hold
//! - An HTTP client for the group API
//!
//! # Sync Protocol
//!
//! 1. A device creates a group (`id` + `pass`); the group starts at version 1
//! 2. `pull` returns `{version, updatedAt, payload}`; the payload is merged
//!    into the full local dataset and the version remembered
//! 3. `push` sends a subset share with `baseVersion` = remembered version
//! 4. If another device pushed in between, the server answers
//!    `VersionConflict` with its current version; the device pulls, merges
//!    and pushes again when the user asks
//!
//! # Conflict Resolution
//!
//! - Unknown ids are inserted
//! - Strictly newer records overlay the local copy field by field
//! - Ties keep the local copy

mod client;
mod merge;
mod payload;
mod share;
mod types;

pub use client::{RemoteError, RemoteErrorKind, SyncClient, SyncError};
pub use merge::{merge, merge_records, Incoming, MergeOutcome, MergeStats, Mergeable};
pub use payload::{decode_incoming, PayloadError};
pub use share::{build_subset, SharePayload, SHARE_MODE_MERGE, SHARE_VERSION};
pub use types::{
    is_valid_group_id, CreateGroupRequest, CreateGroupResponse, ErrorBody, GroupMeta,
    GroupSnapshot, PushRequest, PushResponse, GROUP_ID_MAX_LEN, GROUP_ID_MIN_LEN, PASS_HEADER,
};
