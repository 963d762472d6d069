//! Registry-gated pass-through to the supervisor.

use std::sync::Arc;

use deployd_core::{ServiceId, ServiceRegistry};
use deployd_supervisor::Supervisor;

use crate::error::DeployError;

/// Start/stop/enable/disable and queries for managed services.
///
/// Stateless apart from its handles. Every per-ID call fails with
/// `NotManaged` before touching the supervisor when the registry does not
/// know the ID.
pub struct LifecycleController {
    registry: Arc<ServiceRegistry>,
    supervisor: Arc<dyn Supervisor>,
}

impl LifecycleController {
    pub fn new(registry: Arc<ServiceRegistry>, supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            registry,
            supervisor,
        }
    }

    pub fn start(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.ensure_managed(id)?;
        self.supervisor.start(id)?;
        tracing::info!(service = %id, "service started");
        Ok(())
    }

    pub fn stop(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.ensure_managed(id)?;
        self.supervisor.stop(id)?;
        tracing::info!(service = %id, "service stopped");
        Ok(())
    }

    pub fn enable(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.ensure_managed(id)?;
        self.supervisor.enable(id)?;
        Ok(())
    }

    pub fn disable(&self, id: &ServiceId) -> Result<(), DeployError> {
        self.ensure_managed(id)?;
        self.supervisor.disable(id)?;
        Ok(())
    }

    /// Free-form supervisor status text, for display.
    pub fn status(&self, id: &ServiceId) -> Result<String, DeployError> {
        self.ensure_managed(id)?;
        Ok(self.supervisor.status(id)?)
    }

    pub fn is_running(&self, id: &ServiceId) -> Result<bool, DeployError> {
        self.ensure_managed(id)?;
        Ok(self.supervisor.is_active(id))
    }

    pub fn is_enabled(&self, id: &ServiceId) -> Result<bool, DeployError> {
        self.ensure_managed(id)?;
        Ok(self.supervisor.is_enabled(id))
    }

    /// Ask the supervisor to re-read every unit definition.
    pub fn reload(&self) -> Result<(), DeployError> {
        self.supervisor.reload_all()?;
        tracing::debug!("supervisor reloaded");
        Ok(())
    }

    fn ensure_managed(&self, id: &ServiceId) -> Result<(), DeployError> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(DeployError::not_managed(id))
        }
    }
}
