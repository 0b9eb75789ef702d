//! Stored record models

use crate::orchestration::record::{ConfigRecord, RecordId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A configuration record with its store metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned identifier
    pub id: RecordId,
    /// The record itself
    #[serde(flatten)]
    pub record: ConfigRecord,
    /// When the record was created (Unix timestamp)
    pub created_at: i64,
    /// When the record was last updated (Unix timestamp)
    pub updated_at: i64,
}

/// `records` row; kind and site are only used for filtering
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RecordRow {
    pub(crate) fn into_stored(self) -> Result<StoredRecord, serde_json::Error> {
        Ok(StoredRecord {
            record: serde_json::from_str(&self.body)?,
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
