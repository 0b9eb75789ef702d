//! API module
//!
//! HTTP request handlers for metric and UE location records.

pub mod location;
pub mod metric;
pub mod records;
pub mod response;

pub use response::{ApiResponse, ListQuery};
