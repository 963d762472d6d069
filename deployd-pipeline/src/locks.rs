//! Per-service serialization of multi-step sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use deployd_core::ServiceId;

/// One mutex per service ID, created on first use.
///
/// Install, update, removal, rollback and file deletion for the same ID run
/// one at a time; different IDs never wait on each other. The outer map lock
/// is held only long enough to fetch the per-ID handle.
#[derive(Default)]
pub struct IdLocks {
    locks: Mutex<HashMap<ServiceId, Arc<Mutex<()>>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock<T>(&self, id: &ServiceId, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id.clone()).or_default().clone()
        };
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
