//! Request handler context

use crate::orchestration::Orchestrator;
use crate::state::locks::RecordLocks;
use crate::store::RecordStore;

/// Everything a request handler needs
pub struct AppContext {
    /// Record persistence
    pub store: RecordStore,
    /// Flow lifecycle engine
    pub orchestrator: Orchestrator,
    /// Per-record serialization of lifecycle calls
    pub locks: RecordLocks,
    /// Site assigned to records created without one
    pub default_site: Option<String>,
}

impl AppContext {
    /// Build a context with an empty lock registry
    pub fn new(store: RecordStore, orchestrator: Orchestrator, default_site: Option<String>) -> Self {
        Self {
            store,
            orchestrator,
            locks: RecordLocks::new(),
            default_site,
        }
    }
}
