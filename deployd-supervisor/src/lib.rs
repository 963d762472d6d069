//! deployd-supervisor: the seam between deployd and the host's process
//! supervisor.
//!
//! [`Supervisor`] is the only way the rest of deployd starts, stops or
//! inspects a service. [`Systemd`] drives `systemctl`; `FakeSupervisor`
//! (feature `testing`) is an in-memory stand-in for tests.

pub mod error;
pub mod state;
pub mod systemd;
pub mod unit;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

use std::path::{Path, PathBuf};

use deployd_core::ServiceId;

pub use error::SupervisorError;
pub use state::UnitState;
pub use systemd::Systemd;
pub use unit::UnitRenderer;

#[cfg(any(test, feature = "testing"))]
pub use fake::{Action, FakeSupervisor};

/// Control surface over the host's process supervisor.
///
/// Mutating calls succeed or fail on the supervisor's own verdict. Queries
/// never fail: anything the supervisor cannot answer is
/// [`UnitState::Unknown`].
pub trait Supervisor: Send + Sync {
    fn start(&self, id: &ServiceId) -> Result<(), SupervisorError>;
    fn stop(&self, id: &ServiceId) -> Result<(), SupervisorError>;
    fn enable(&self, id: &ServiceId) -> Result<(), SupervisorError>;
    fn disable(&self, id: &ServiceId) -> Result<(), SupervisorError>;

    /// Human-readable status text. Returned even when the unit is stopped.
    fn status(&self, id: &ServiceId) -> Result<String, SupervisorError>;

    fn active_state(&self, id: &ServiceId) -> UnitState;
    fn enablement(&self, id: &ServiceId) -> UnitState;

    /// Re-read all unit definitions.
    fn reload_all(&self) -> Result<(), SupervisorError>;

    /// Write the unit definition for `id` running out of `location`.
    fn register(&self, id: &ServiceId, location: &Path) -> Result<PathBuf, SupervisorError>;

    fn unit_installed(&self, id: &ServiceId) -> bool;

    /// Delete the unit definition. Fails with
    /// [`SupervisorError::UnitNotFound`] when there is none.
    fn unregister(&self, id: &ServiceId) -> Result<(), SupervisorError>;

    fn is_active(&self, id: &ServiceId) -> bool {
        self.active_state(id).is_active()
    }

    fn is_enabled(&self, id: &ServiceId) -> bool {
        self.enablement(id).is_enabled()
    }
}
