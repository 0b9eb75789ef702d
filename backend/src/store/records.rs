//! Record database operations
//!
//! Handles all database interactions for configuration records.

use crate::orchestration::record::{ConfigRecord, RecordId, RecordKind, RecordPatch};
use crate::store::models::{RecordRow, StoredRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Errors raised by the record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database could not be opened or prepared
    #[error("Failed to open database: {0}")]
    Open(String),

    /// A statement failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored body could not be encoded or decoded
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The partial update does not fit the stored record
    #[error("Invalid update: {0}")]
    InvalidPatch(String),
}

/// Persistence for configuration records
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file, or a `sqlite:` URL
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        let connection_string = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            // Ensure parent directory exists
            if let Some(parent) = PathBuf::from(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Open(format!("Failed to create db directory: {}", e))
                    })?;
                }
            }
            format!("sqlite:{}", db_path)
        };

        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| StoreError::Open(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open(format!("Failed to connect to database: {}", e)))?;

        info!("Connected to SQLite database at: {}", db_path);

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        let migration_sql = include_str!("../../migrations/001_create_records.sql");

        let mut cleaned_sql = String::new();
        for line in migration_sql.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
            let without_comments = match trimmed.find("--") {
                Some(comment_pos) => &trimmed[..comment_pos],
                None => trimmed,
            };
            cleaned_sql.push_str(without_comments.trim());
            cleaned_sql.push(' ');
        }

        for statement in cleaned_sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    StoreError::Open(format!(
                        "Migration failed: {} - Statement: {}",
                        e,
                        statement.chars().take(100).collect::<String>()
                    ))
                })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get a record by ID
    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, body, created_at, updated_at FROM records WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RecordRow::into_stored).transpose().map_err(StoreError::from)
    }

    /// List records of one kind, oldest first, optionally for one site
    pub async fn list(
        &self,
        kind: RecordKind,
        site: Option<&str>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = match site {
            Some(site) => {
                sqlx::query_as::<_, RecordRow>(
                    "SELECT id, body, created_at, updated_at FROM records WHERE kind = ? AND site = ? ORDER BY created_at, id",
                )
                .bind(kind.as_str())
                .bind(site)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RecordRow>(
                    "SELECT id, body, created_at, updated_at FROM records WHERE kind = ? ORDER BY created_at, id",
                )
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(|row| row.into_stored().map_err(StoreError::from))
            .collect()
    }

    /// Fresh record identifier
    pub fn next_id() -> RecordId {
        Uuid::new_v4().to_string()
    }

    /// Store a new record under a fresh identifier
    pub async fn create(&self, record: ConfigRecord) -> Result<StoredRecord, StoreError> {
        self.insert(Self::next_id(), record).await
    }

    /// Store a new record under an identifier obtained from [`Self::next_id`]
    pub async fn insert(&self, id: RecordId, record: ConfigRecord) -> Result<StoredRecord, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let stored = StoredRecord {
            id,
            record,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO records (id, kind, site, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&stored.id)
        .bind(stored.record.kind().as_str())
        .bind(stored.record.site())
        .bind(serde_json::to_string(&stored.record)?)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(record_id = %stored.id, kind = stored.record.kind().as_str(), "Created record");
        Ok(stored)
    }

    /// Apply a partial update
    ///
    /// Returns `false` when the record does not exist or the patch is empty.
    pub async fn update(&self, id: &str, patch: &RecordPatch) -> Result<bool, StoreError> {
        if patch.is_empty() {
            return Ok(false);
        }
        let Some(current) = self.get(id).await? else {
            return Ok(false);
        };
        let merged = current
            .record
            .patched(patch)
            .map_err(|e| StoreError::InvalidPatch(e.to_string()))?;

        let result = sqlx::query("UPDATE records SET site = ?, body = ?, updated_at = ? WHERE id = ?")
            .bind(merged.site())
            .bind(serde_json::to_string(&merged)?)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(record_id = %id, "Updated record");
        Ok(result.rows_affected() > 0)
    }

    /// Delete a record; `false` when it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        debug!(record_id = %id, "Deleted record");
        Ok(result.rows_affected() > 0)
    }
}
