//! Application state
//!
//! Shared context handed to every request handler.

pub mod context;
pub mod locks;

pub use context::AppContext;
pub use locks::RecordLocks;
