//! Per-record lifecycle locks
//!
//! Lifecycle calls for the same record identifier must not interleave. Each
//! identifier gets its own async mutex, held across the store write and the
//! engine call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-identifier async mutexes
#[derive(Default)]
pub struct RecordLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RecordLocks {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Drop the slot of `id` once nobody holds or waits for it
    pub fn prune(&self, id: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get(id) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(id);
            }
        }
    }

    /// Number of identifiers currently tracked
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// True when no identifier is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
