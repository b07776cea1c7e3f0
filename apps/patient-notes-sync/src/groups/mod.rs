//! Remote group store
//!
//! Each group is a password-gated slot holding one versioned payload.
//!
//! - `GroupRepository`: SQLite persistence; every write is a single
//!   compare-and-swap statement so concurrent writers cannot interleave
//!   between the version check and the update
//! - `GroupService`: request validation, password verification and the
//!   write policy on top of the repository

mod service;
mod store;

pub use service::GroupService;
pub use store::{GroupRepository, WriteOutcome};
