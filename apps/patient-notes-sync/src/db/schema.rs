//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Access control: one password hash per group
CREATE TABLE IF NOT EXISTS group_meta (
    id TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Versioned payload; version only ever moves by +1
CREATE TABLE IF NOT EXISTS group_data (
    id TEXT PRIMARY KEY REFERENCES group_meta(id),
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    updated_at TEXT NOT NULL,
    payload TEXT
);
"#;
