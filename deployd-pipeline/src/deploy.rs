//! Install, update, removal and rollback sequences.
//!
//! Each sequence for one ID runs under that ID's [`IdLocks`] entry. The
//! registry lock is never held across a supervisor call or file I/O; the
//! registry only sees the final put/touch/remove.
//!
//! Failure semantics: preconditions (`NotManaged`, `BadArtifact`,
//! `InvalidPath`) are checked before any side effect. A mid-sequence failure
//! aborts the remaining steps without undoing completed ones.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use deployd_core::{ErrorSink, Layout, Service, ServiceId, ServiceRegistry};
use deployd_supervisor::{Supervisor, SupervisorError};

use crate::archiver::{self, Snapshot};
use crate::artifact::{self, Artifact};
use crate::error::{io_err, ArchiveError, DeployError};
use crate::locks::IdLocks;
use crate::sanitize::resolve_within;

/// Mode for the primary executable, the file named exactly like the ID.
pub const EXECUTABLE_MODE: u32 = 0o755;
/// Mode for files written by [`Pipeline::update`].
pub const UPDATED_FILE_MODE: u32 = 0o644;

pub struct Pipeline {
    layout: Layout,
    registry: Arc<ServiceRegistry>,
    supervisor: Arc<dyn Supervisor>,
    sink: Arc<dyn ErrorSink>,
    locks: Arc<IdLocks>,
}

impl Pipeline {
    pub fn new(
        layout: Layout,
        registry: Arc<ServiceRegistry>,
        supervisor: Arc<dyn Supervisor>,
        sink: Arc<dyn ErrorSink>,
        locks: Arc<IdLocks>,
    ) -> Self {
        Self {
            layout,
            registry,
            supervisor,
            sink,
            locks,
        }
    }

    /// Install a new service or re-install an existing one from a zip
    /// payload. The ID comes from `declared_name`.
    ///
    /// The new service is registered with the supervisor but not started.
    pub fn install(&self, payload: Vec<u8>, declared_name: &str) -> Result<Service, DeployError> {
        let mut artifact = Artifact::parse(payload).map_err(bad_artifact)?;
        let id = ServiceId::from_artifact_name(declared_name)
            .map_err(|e| DeployError::BadArtifact(e.to_string()))?;
        self.locks
            .with_lock(&id, || self.install_locked(&id, &mut artifact))
    }

    /// Replace a single file inside a managed service.
    ///
    /// A running service is stopped first and restarted afterwards. A failed
    /// restart is returned, but the new content stays written.
    pub fn update(
        &self,
        id: &ServiceId,
        file_name: &str,
        content: &[u8],
    ) -> Result<Service, DeployError> {
        self.ensure_managed(id)?;
        let dir = self.layout.service_dir(id);
        let target = resolve_within(&dir, file_name)?;

        self.locks.with_lock(id, || {
            self.ensure_managed(id)?;
            let was_running = self.supervisor.is_active(id);
            if was_running {
                self.supervisor.stop(id)?;
            }

            write_file(&target, content)?;
            if target == self.layout.executable_path(id) {
                artifact::set_mode(&target, EXECUTABLE_MODE).map_err(archive_to_io)?;
            }
            let stamped = self.registry.touch(id);
            tracing::info!(service = %id, file = file_name, "file updated");

            if was_running {
                self.supervisor.start(id)?;
            }
            stamped.ok_or_else(|| DeployError::not_managed(id))
        })
    }

    /// Stop, disable and unregister a managed service, then drop its record.
    ///
    /// The artifact directory and backups stay on disk. A missing unit
    /// definition fails with `UnitNotFound` and leaves the registry entry.
    pub fn remove(&self, id: &ServiceId) -> Result<Service, DeployError> {
        self.locks.with_lock(id, || {
            let service = self
                .registry
                .get(id)
                .ok_or_else(|| DeployError::not_managed(id))?;

            if self.supervisor.is_active(id) {
                self.supervisor.stop(id)?;
            }
            if self.supervisor.is_enabled(id) {
                self.supervisor.disable(id)?;
            }
            if !self.supervisor.unit_installed(id) {
                return Err(DeployError::UnitNotFound(id.clone()));
            }
            self.supervisor.unregister(id).map_err(|e| match e {
                SupervisorError::UnitNotFound { .. } => DeployError::UnitNotFound(id.clone()),
                other => DeployError::Supervisor(other),
            })?;
            self.registry.remove(id)?;
            tracing::info!(service = %id, "service removed");
            Ok(service)
        })
    }

    /// Re-install a managed service from one of its snapshots: the newest
    /// when `snapshot` is `None`. Goes through the normal install sequence,
    /// so the current tree is archived first.
    pub fn rollback(&self, id: &ServiceId, snapshot: Option<&str>) -> Result<Service, DeployError> {
        self.locks.with_lock(id, || {
            self.ensure_managed(id)?;
            let chosen = self.pick_snapshot(id, snapshot)?;
            let payload = fs::read(&chosen.path).map_err(|e| io_err(&chosen.path, e))?;
            let mut artifact = Artifact::parse(payload).map_err(bad_artifact)?;
            tracing::info!(service = %id, snapshot = %chosen.name, "rolling back");
            self.install_locked(id, &mut artifact)
        })
    }

    /// Snapshots of a managed service, newest first.
    pub fn backups(&self, id: &ServiceId) -> Result<Vec<Snapshot>, DeployError> {
        self.ensure_managed(id)?;
        archiver::list(&self.layout, id).map_err(archive_to_io)
    }

    fn install_locked(
        &self,
        id: &ServiceId,
        artifact: &mut Artifact,
    ) -> Result<Service, DeployError> {
        let dir = self.layout.service_dir(id);
        self.retire_current(id, &dir)?;

        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let extracted = artifact.extract(&dir, self.sink.as_ref());

        self.supervisor.register(id, &dir)?;
        let executable = self.layout.executable_path(id);
        artifact::set_mode(&executable, EXECUTABLE_MODE).map_err(archive_to_io)?;

        let service = Service::new(id.clone(), &self.layout, Utc::now());
        self.registry.put(service.clone())?;
        tracing::info!(
            service = %id,
            files = extracted.files,
            skipped = extracted.skipped,
            "service installed"
        );
        Ok(service)
    }

    /// Clear the way for a fresh tree: stop a running managed service, then
    /// archive and delete its artifact directory.
    ///
    /// A managed service must have a directory to archive; its absence fails
    /// the install. An unmanaged ID only archives a leftover directory.
    fn retire_current(&self, id: &ServiceId, dir: &Path) -> Result<(), DeployError> {
        let managed = self.registry.contains(id);
        if managed && self.supervisor.is_active(id) {
            self.supervisor.stop(id)?;
        }
        if !managed && !dir.exists() {
            return Ok(());
        }
        archiver::snapshot(&self.layout, id).map_err(|source| DeployError::ArchivalFailed {
            id: id.clone(),
            source,
        })?;
        fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))
    }

    fn pick_snapshot(&self, id: &ServiceId, name: Option<&str>) -> Result<Snapshot, DeployError> {
        let snapshots = archiver::list(&self.layout, id).map_err(archive_to_io)?;
        let found = match name {
            None => snapshots.into_iter().next(),
            Some(wanted) => {
                let stem = wanted.strip_suffix(".zip").unwrap_or(wanted);
                snapshots.into_iter().find(|s| s.name == stem)
            }
        };
        found.ok_or_else(|| DeployError::SnapshotNotFound {
            id: id.clone(),
            name: name.unwrap_or("latest").to_string(),
        })
    }

    fn ensure_managed(&self, id: &ServiceId) -> Result<(), DeployError> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(DeployError::not_managed(id))
        }
    }
}

fn write_file(target: &Path, content: &[u8]) -> Result<(), DeployError> {
    if target.exists() {
        fs::remove_file(target).map_err(|e| io_err(target, e))?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(target, content).map_err(|e| io_err(target, e))?;
    artifact::set_mode(target, UPDATED_FILE_MODE).map_err(archive_to_io)
}

fn bad_artifact(err: ArchiveError) -> DeployError {
    DeployError::BadArtifact(err.to_string())
}

/// Filesystem failures outside archival surface as plain I/O errors.
fn archive_to_io(err: ArchiveError) -> DeployError {
    match err {
        ArchiveError::Io { path, source } => DeployError::Io { path, source },
        other => DeployError::Io {
            path: Default::default(),
            source: std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        },
    }
}
