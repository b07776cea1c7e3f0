//! Group persistence
//!
//! SQLite storage for group credentials and versioned payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::sync::{GroupMeta, GroupSnapshot};

/// Result of a conditional payload write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored; carries the new version
    Written(u64),
    /// `base_version` was stale; carries the server's current version
    Conflict(u64),
    /// No such group
    Missing,
}

/// Repository for group persistence
pub struct GroupRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GroupRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a group at version 1 with no payload. Returns `false` if the id is taken.
    pub async fn insert(&self, id: &str, password_hash: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO group_meta (id, password_hash, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO group_data (id, version, updated_at, payload)
            VALUES (?, 1, ?, NULL)
            "#,
        )
        .bind(id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Stored password hash for a group
    pub async fn password_hash(&self, id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM group_meta WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(hash,)| hash))
    }

    /// Current version, update time and payload of a group
    pub async fn snapshot(&self, id: &str) -> Result<Option<GroupSnapshot>> {
        let row: Option<GroupDataRow> = sqlx::query_as(
            "SELECT version, updated_at, payload FROM group_data WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(GroupDataRow::into_snapshot).transpose()
    }

    /// Version and update time only
    pub async fn meta(&self, id: &str) -> Result<Option<GroupMeta>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT version, updated_at FROM group_data WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        row.map(|(version, updated_at)| {
            Ok(GroupMeta {
                version: version as u64,
                updated_at: parse_time(&updated_at)?,
            })
        })
        .transpose()
    }

    /// Current version of a group
    pub async fn version(&self, id: &str) -> Result<Option<u64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM group_data WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|(v,)| v as u64))
    }

    /// Store a payload and bump the version by one.
    ///
    /// With `base_version`, the check and the write are one statement: the
    /// row is only updated while its version still equals `base_version`.
    pub async fn write(
        &self,
        id: &str,
        base_version: Option<u64>,
        payload: &Value,
    ) -> Result<WriteOutcome> {
        let now = Utc::now().to_rfc3339();
        let payload = if payload.is_null() {
            None
        } else {
            Some(serde_json::to_string(payload)?)
        };

        let written: Option<(i64,)> = match base_version {
            Some(base) => {
                sqlx::query_as(
                    r#"
                    UPDATE group_data
                    SET version = version + 1, updated_at = ?, payload = ?
                    WHERE id = ? AND version = ?
                    RETURNING version
                    "#,
                )
                .bind(&now)
                .bind(&payload)
                .bind(id)
                .bind(base as i64)
                .fetch_optional(self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    UPDATE group_data
                    SET version = version + 1, updated_at = ?, payload = ?
                    WHERE id = ?
                    RETURNING version
                    "#,
                )
                .bind(&now)
                .bind(&payload)
                .bind(id)
                .fetch_optional(self.pool)
                .await?
            }
        };

        if let Some((version,)) = written {
            return Ok(WriteOutcome::Written(version as u64));
        }

        Ok(match self.version(id).await? {
            Some(current) => WriteOutcome::Conflict(current),
            None => WriteOutcome::Missing,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Bad stored timestamp {:?}: {}", raw, e)))
}

#[derive(sqlx::FromRow)]
struct GroupDataRow {
    version: i64,
    updated_at: String,
    payload: Option<String>,
}

impl GroupDataRow {
    fn into_snapshot(self) -> Result<GroupSnapshot> {
        let payload = match self.payload {
            Some(text) => serde_json::from_str(&text)?,
            None => Value::Null,
        };

        Ok(GroupSnapshot {
            version: self.version as u64,
            updated_at: parse_time(&self.updated_at)?,
            payload,
        })
    }
}
