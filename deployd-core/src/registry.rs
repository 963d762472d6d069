//! In-memory index of managed services with write-through persistence.
//!
//! The registry is the single answer to "is this ID managed". Lookups take a
//! shared lock, mutations an exclusive one. Guards are always dropped before
//! the record store is touched, so slow disk I/O for one service never holds
//! up lookups for another.
//!
//! Share it as `Arc<ServiceRegistry>`; there is no global instance.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::StoreError;
use crate::sink::ErrorSink;
use crate::store::RecordStore;
use crate::types::{Service, ServiceId};

pub struct ServiceRegistry {
    services: RwLock<HashMap<ServiceId, Service>>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn ErrorSink>,
}

impl ServiceRegistry {
    /// Empty registry over `store`. Call [`ServiceRegistry::load`] to populate.
    pub fn new(store: Arc<dyn RecordStore>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            store,
            sink,
        }
    }

    /// Construct and load in one step; the startup path.
    pub fn open(store: Arc<dyn RecordStore>, sink: Arc<dyn ErrorSink>) -> Self {
        let registry = Self::new(store, sink);
        registry.load();
        registry
    }

    /// Populate the map from the store. Best-effort: a read failure is
    /// reported to the sink and leaves the map empty.
    pub fn load(&self) -> usize {
        match self.store.load_services() {
            Ok(services) => self.replace_all(services),
            Err(err) => {
                self.sink.report("registry load", &err);
                self.write().clear();
                0
            }
        }
    }

    /// Replace the map with the store's contents, repairing any divergence.
    /// Unlike [`ServiceRegistry::load`] a store failure is returned and the
    /// current map is kept.
    pub fn resync(&self) -> Result<usize, StoreError> {
        let services = self.store.load_services()?;
        Ok(self.replace_all(services))
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.read().contains_key(id)
    }

    pub fn get(&self, id: &ServiceId) -> Option<Service> {
        self.read().get(id).cloned()
    }

    /// Snapshot of every managed service, sorted by ID.
    pub fn list(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.read().values().cloned().collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));
        services
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Insert or overwrite the entry, then persist it.
    ///
    /// A persistence failure is returned but the in-memory entry stays; the
    /// caller decides whether to roll back.
    pub fn put(&self, service: Service) -> Result<(), StoreError> {
        self.write().insert(service.id.clone(), service.clone());
        self.store.save_service(&service)
    }

    /// Delete the persisted record, then the in-memory entry. A store
    /// failure leaves both in place.
    pub fn remove(&self, id: &ServiceId) -> Result<Option<Service>, StoreError> {
        self.store.delete_service(id)?;
        Ok(self.write().remove(id))
    }

    /// Stamp an existing entry with the current time and persist it.
    ///
    /// Absent entries are a no-op. Persistence failures go to the error sink:
    /// callers touch after a change has already committed on disk.
    pub fn touch(&self, id: &ServiceId) -> Option<Service> {
        let stamped = {
            let mut services = self.write();
            let service = services.get_mut(id)?;
            service.timestamp = Utc::now();
            service.clone()
        };
        if let Err(err) = self.store.save_service(&stamped) {
            self.sink.report("registry touch", &err);
        }
        Some(stamped)
    }

    fn replace_all(&self, services: Vec<Service>) -> usize {
        let fresh: HashMap<ServiceId, Service> = services
            .into_iter()
            .map(|service| (service.id.clone(), service))
            .collect();
        let count = fresh.len();
        *self.write() = fresh;
        tracing::debug!(count, "registry loaded from store");
        count
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ServiceId, Service>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ServiceId, Service>> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
