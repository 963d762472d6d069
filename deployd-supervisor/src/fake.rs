//! In-memory [`Supervisor`] for tests.
//!
//! Tracks registered units, active and enabled sets, and journals every
//! mutating call as `"<action> <id>"`. Failures can be injected per action.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use deployd_core::ServiceId;

use crate::error::SupervisorError;
use crate::state::UnitState;
use crate::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    Start,
    Stop,
    Enable,
    Disable,
    Reload,
    Register,
    Unregister,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Enable => "enable",
            Action::Disable => "disable",
            Action::Reload => "daemon-reload",
            Action::Register => "register",
            Action::Unregister => "unregister",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Probe = Box<dyn Fn(Action, &ServiceId) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    units: BTreeMap<ServiceId, PathBuf>,
    active: BTreeSet<ServiceId>,
    enabled: BTreeSet<ServiceId>,
    failing: BTreeSet<Action>,
    journal: Vec<String>,
}

#[derive(Default)]
pub struct FakeSupervisor {
    state: Mutex<FakeState>,
    probe: Mutex<Option<Probe>>,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `action` fail.
    pub fn fail_on(&self, action: Action) {
        self.lock().failing.insert(action);
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Run `probe` at the moment each mutating call is made, before its
    /// effect is applied.
    pub fn set_probe(&self, probe: impl Fn(Action, &ServiceId) + Send + Sync + 'static) {
        *self.probe.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(probe));
    }

    pub fn set_active(&self, id: &ServiceId, active: bool) {
        let mut state = self.lock();
        if active {
            state.active.insert(id.clone());
        } else {
            state.active.remove(id);
        }
    }

    pub fn set_enabled(&self, id: &ServiceId, enabled: bool) {
        let mut state = self.lock();
        if enabled {
            state.enabled.insert(id.clone());
        } else {
            state.enabled.remove(id);
        }
    }

    /// Drop a unit definition behind deployd's back.
    pub fn forget_unit(&self, id: &ServiceId) {
        self.lock().units.remove(id);
    }

    pub fn registered_location(&self, id: &ServiceId) -> Option<PathBuf> {
        self.lock().units.get(id).cloned()
    }

    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Journal entries mentioning `id`.
    pub fn journal_for(&self, id: &ServiceId) -> Vec<String> {
        let suffix = format!(" {id}");
        self.journal()
            .into_iter()
            .filter(|entry| entry.ends_with(&suffix))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Journal the call, run the probe, and fail if the action is poisoned.
    fn call(&self, action: Action, id: &ServiceId) -> Result<(), SupervisorError> {
        if let Some(probe) = self
            .probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            probe(action, id);
        }
        let mut state = self.lock();
        state.journal.push(format!("{action} {id}"));
        if state.failing.contains(&action) {
            return Err(SupervisorError::Command {
                action: action.as_str(),
                unit: format!("{id}.service"),
                detail: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn require_unit(&self, action: Action, id: &ServiceId) -> Result<(), SupervisorError> {
        if self.lock().units.contains_key(id) {
            return Ok(());
        }
        Err(SupervisorError::Command {
            action: action.as_str(),
            unit: format!("{id}.service"),
            detail: format!("Unit {id}.service not found."),
        })
    }
}

impl Supervisor for FakeSupervisor {
    fn start(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.call(Action::Start, id)?;
        self.require_unit(Action::Start, id)?;
        self.lock().active.insert(id.clone());
        Ok(())
    }

    fn stop(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.call(Action::Stop, id)?;
        self.lock().active.remove(id);
        Ok(())
    }

    fn enable(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.call(Action::Enable, id)?;
        self.require_unit(Action::Enable, id)?;
        self.lock().enabled.insert(id.clone());
        Ok(())
    }

    fn disable(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.call(Action::Disable, id)?;
        self.lock().enabled.remove(id);
        Ok(())
    }

    fn status(&self, id: &ServiceId) -> Result<String, SupervisorError> {
        let state = self.lock();
        let active = if state.active.contains(id) {
            UnitState::Active
        } else {
            UnitState::Inactive
        };
        Ok(format!("{id}.service - fake unit\n   Active: {active}\n"))
    }

    fn active_state(&self, id: &ServiceId) -> UnitState {
        if self.lock().active.contains(id) {
            UnitState::Active
        } else {
            UnitState::Inactive
        }
    }

    fn enablement(&self, id: &ServiceId) -> UnitState {
        if self.lock().enabled.contains(id) {
            UnitState::Enabled
        } else {
            UnitState::Disabled
        }
    }

    fn reload_all(&self) -> Result<(), SupervisorError> {
        let mut state = self.lock();
        state.journal.push(Action::Reload.to_string());
        if state.failing.contains(&Action::Reload) {
            return Err(SupervisorError::Command {
                action: Action::Reload.as_str(),
                unit: String::new(),
                detail: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn register(&self, id: &ServiceId, location: &Path) -> Result<PathBuf, SupervisorError> {
        self.call(Action::Register, id)?;
        self.lock().units.insert(id.clone(), location.to_path_buf());
        Ok(PathBuf::from(format!("/fake/units/{id}.service")))
    }

    fn unit_installed(&self, id: &ServiceId) -> bool {
        self.lock().units.contains_key(id)
    }

    fn unregister(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.call(Action::Unregister, id)?;
        let mut state = self.lock();
        if state.units.remove(id).is_none() {
            return Err(SupervisorError::UnitNotFound {
                path: PathBuf::from(format!("/fake/units/{id}.service")),
            });
        }
        state.active.remove(id);
        state.enabled.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ServiceId {
        ServiceId::parse(raw).unwrap()
    }

    #[test]
    fn start_requires_registered_unit() {
        let fake = FakeSupervisor::new();
        assert!(fake.start(&id("api")).is_err());
        fake.register(&id("api"), Path::new("/srv/api")).unwrap();
        fake.start(&id("api")).unwrap();
        assert!(fake.is_active(&id("api")));
        assert_eq!(fake.journal(), vec!["start api", "register api", "start api"]);
    }

    #[test]
    fn injected_failure_leaves_state_unchanged() {
        let fake = FakeSupervisor::new();
        fake.set_active(&id("api"), true);
        fake.fail_on(Action::Stop);
        assert!(fake.stop(&id("api")).is_err());
        assert!(fake.is_active(&id("api")));
    }

    #[test]
    fn unregister_unknown_unit_is_not_found() {
        let fake = FakeSupervisor::new();
        assert!(matches!(
            fake.unregister(&id("api")),
            Err(SupervisorError::UnitNotFound { .. })
        ));
    }
}
