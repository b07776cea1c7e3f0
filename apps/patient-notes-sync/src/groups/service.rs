//! Group access control and write policy

use serde_json::Value;
use sqlx::SqlitePool;

use super::store::{GroupRepository, WriteOutcome};
use crate::config::GroupPolicy;
use crate::crypto::{hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::sync::{is_valid_group_id, GroupMeta, GroupSnapshot, PushRequest};

/// Server-side owner of every group record
#[derive(Clone)]
pub struct GroupService {
    pool: SqlitePool,
    policy: GroupPolicy,
}

impl GroupService {
    pub fn new(pool: SqlitePool, policy: GroupPolicy) -> Self {
        Self { pool, policy }
    }

    fn repo(&self) -> GroupRepository<'_> {
        GroupRepository::new(&self.pool)
    }

    fn check_id(id: &str) -> Result<()> {
        if is_valid_group_id(id) {
            Ok(())
        } else {
            Err(AppError::BadId)
        }
    }

    /// Create a group (`Uncreated -> Active`)
    pub async fn create(&self, id: &str, pass: &str) -> Result<()> {
        Self::check_id(id)?;
        if pass.is_empty() {
            return Err(AppError::MissingPass);
        }

        if !self.repo().insert(id, &hash_password(pass)).await? {
            tracing::warn!("Refused to create group {}: already exists", id);
            return Err(AppError::GroupExists);
        }

        tracing::info!("Created group {}", id);
        Ok(())
    }

    /// Verify that `pass` opens group `id`
    async fn authorize(&self, id: &str, pass: Option<&str>) -> Result<()> {
        Self::check_id(id)?;
        let pass = pass.filter(|p| !p.is_empty()).ok_or(AppError::MissingPass)?;

        let stored = self.repo().password_hash(id).await?.ok_or(AppError::NotFound)?;
        if !verify_password(pass, &stored) {
            tracing::warn!("Wrong password for group {}", id);
            return Err(AppError::Forbidden);
        }

        Ok(())
    }

    /// Current `{version, updatedAt, payload}` of a group
    pub async fn pull(&self, id: &str, pass: Option<&str>) -> Result<GroupSnapshot> {
        self.authorize(id, pass).await?;
        self.repo().snapshot(id).await?.ok_or(AppError::NotFound)
    }

    /// Store a new payload and return the new version
    pub async fn push(&self, id: &str, pass: Option<&str>, request: PushRequest) -> Result<u64> {
        self.authorize(id, pass).await?;

        let payload: Value = request.payload.ok_or(AppError::BadPayload)?;
        if request.base_version.is_none() && self.policy.require_base_version {
            return Err(AppError::MissingBaseVersion);
        }

        match self.repo().write(id, request.base_version, &payload).await? {
            WriteOutcome::Written(version) => {
                tracing::info!("Group {} now at version {}", id, version);
                Ok(version)
            }
            WriteOutcome::Conflict(current_version) => {
                tracing::warn!(
                    "Stale push to group {}: base {:?}, current {}",
                    id,
                    request.base_version,
                    current_version
                );
                Err(AppError::VersionConflict { current_version })
            }
            WriteOutcome::Missing => Err(AppError::NotFound),
        }
    }

    /// Version and update time, readable without the group password
    pub async fn meta(&self, id: &str) -> Result<GroupMeta> {
        Self::check_id(id)?;
        self.repo().meta(id).await?.ok_or(AppError::NotFound)
    }
}
