//! `ServiceManager`: every outward operation behind one handle.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use deployd_core::{ErrorSink, Layout, Service, ServiceId, ServiceRegistry};
use deployd_supervisor::Supervisor;

use crate::archiver::Snapshot;
use crate::deploy::Pipeline;
use crate::error::{io_err, DeployError};
use crate::files::{FileManager, ServiceFile};
use crate::lifecycle::LifecycleController;
use crate::locks::IdLocks;

pub struct ServiceManager {
    registry: Arc<ServiceRegistry>,
    pipeline: Pipeline,
    lifecycle: LifecycleController,
    files: FileManager,
}

impl ServiceManager {
    pub fn new(
        layout: Layout,
        registry: Arc<ServiceRegistry>,
        supervisor: Arc<dyn Supervisor>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let locks = Arc::new(IdLocks::new());
        Self {
            pipeline: Pipeline::new(
                layout.clone(),
                registry.clone(),
                supervisor.clone(),
                sink,
                locks.clone(),
            ),
            lifecycle: LifecycleController::new(registry.clone(), supervisor),
            files: FileManager::new(layout, registry.clone(), locks),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn files(&self) -> &FileManager {
        &self.files
    }

    // -- deployment -------------------------------------------------------

    pub fn install(&self, payload: Vec<u8>, declared_name: &str) -> Result<Service, DeployError> {
        self.pipeline.install(payload, declared_name)
    }

    /// Install from an archive on disk. The declared name defaults to the
    /// archive's file name.
    pub fn install_path(
        &self,
        archive: &Path,
        declared_name: Option<&str>,
    ) -> Result<Service, DeployError> {
        let payload = fs::read(archive).map_err(|e| io_err(archive, e))?;
        let fallback = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.install(payload, declared_name.unwrap_or(&fallback))
    }

    pub fn update(
        &self,
        id: &ServiceId,
        file_name: &str,
        content: &[u8],
    ) -> Result<Service, DeployError> {
        self.pipeline.update(id, file_name, content)
    }

    pub fn remove(&self, id: &ServiceId) -> Result<Service, DeployError> {
        self.pipeline.remove(id)
    }

    pub fn rollback(&self, id: &ServiceId, snapshot: Option<&str>) -> Result<Service, DeployError> {
        self.pipeline.rollback(id, snapshot)
    }

    pub fn backups(&self, id: &ServiceId) -> Result<Vec<Snapshot>, DeployError> {
        self.pipeline.backups(id)
    }

    // -- lifecycle --------------------------------------------------------

    pub fn start(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.lifecycle.start(id)
    }

    pub fn stop(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.lifecycle.stop(id)
    }

    pub fn enable(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.lifecycle.enable(id)
    }

    pub fn disable(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.lifecycle.disable(id)
    }

    pub fn reload(&self) -> Result<(), DeployError> {
        self.lifecycle.reload()
    }

    pub fn status(&self, id: &ServiceId) -> Result<String, DeployError> {
        self.lifecycle.status(id)
    }

    pub fn is_running(&self, id: &ServiceId) -> Result<bool, DeployError> {
        self.lifecycle.is_running(id)
    }

    pub fn is_enabled(&self, id: &ServiceId) -> Result<bool, DeployError> {
        self.lifecycle.is_enabled(id)
    }

    // -- files ------------------------------------------------------------

    pub fn list_files(&self, id: &ServiceId) -> Result<Vec<ServiceFile>, DeployError> {
        self.files.list_files(id)
    }

    pub fn delete_file(&self, id: &ServiceId, token: &str) -> Result<String, DeployError> {
        self.files.delete_file(id, token)
    }

    // -- registry ---------------------------------------------------------

    pub fn list(&self) -> Vec<Service> {
        self.registry.list()
    }

    /// Reload the registry from the record store, repairing divergence.
    pub fn resync(&self) -> Result<usize, DeployError> {
        Ok(self.registry.resync()?)
    }
}
