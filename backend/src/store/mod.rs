//! Record store
//!
//! Configuration records persisted in SQLite.

pub mod models;
pub mod records;

pub use models::StoredRecord;
pub use records::{RecordStore, StoreError};
