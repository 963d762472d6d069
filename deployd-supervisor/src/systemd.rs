//! `systemctl`-backed [`Supervisor`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use deployd_core::ServiceId;

use crate::error::{io_err, SupervisorError};
use crate::state::{classify_active, classify_enablement, UnitState};
use crate::unit::UnitRenderer;
use crate::Supervisor;

pub const DEFAULT_UNIT_DIR: &str = "/lib/systemd/system";
pub const DEFAULT_PROGRAM: &str = "systemctl";

pub struct Systemd {
    program: PathBuf,
    unit_dir: PathBuf,
    renderer: UnitRenderer,
}

impl Systemd {
    pub fn new(unit_dir: impl Into<PathBuf>, renderer: UnitRenderer) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            unit_dir: unit_dir.into(),
            renderer,
        }
    }

    /// Run `program` instead of `systemctl` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn unit_path(&self, id: &ServiceId) -> PathBuf {
        self.unit_dir.join(unit_name(id))
    }

    fn run(&self, args: &[&str]) -> Result<Output, SupervisorError> {
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    /// Run `<action> <id>.service` and judge it by exit status alone.
    fn run_unit(&self, action: &'static str, id: &ServiceId) -> Result<(), SupervisorError> {
        let unit = unit_name(id);
        let output = self.run(&[action, &unit])?;
        if output.status.success() {
            tracing::debug!(%unit, action, "systemctl ok");
            return Ok(());
        }
        Err(SupervisorError::Command {
            action,
            unit,
            detail: failure_detail(&output),
        })
    }

    /// Stdout of a query; a spawn failure is logged and yields `None`.
    fn query(&self, action: &str, id: &ServiceId) -> Option<String> {
        match self.run(&[action, &unit_name(id)]) {
            Ok(output) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            Err(err) => {
                tracing::warn!(%id, action, error = %err, "systemctl query failed");
                None
            }
        }
    }
}

impl Supervisor for Systemd {
    fn start(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.run_unit("start", id)
    }

    fn stop(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.run_unit("stop", id)
    }

    fn enable(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.run_unit("enable", id)
    }

    fn disable(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        self.run_unit("disable", id)
    }

    // `systemctl status` exits non-zero for stopped units; the text is still
    // what the caller wants.
    fn status(&self, id: &ServiceId) -> Result<String, SupervisorError> {
        let output = self.run(&["status", "--no-pager", &unit_name(id)])?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }

    fn active_state(&self, id: &ServiceId) -> UnitState {
        self.query("is-active", id)
            .map_or(UnitState::Unknown, |out| classify_active(&out))
    }

    fn enablement(&self, id: &ServiceId) -> UnitState {
        self.query("is-enabled", id)
            .map_or(UnitState::Unknown, |out| classify_enablement(&out))
    }

    fn reload_all(&self) -> Result<(), SupervisorError> {
        let output = self.run(&["daemon-reload"])?;
        if output.status.success() {
            return Ok(());
        }
        Err(SupervisorError::Command {
            action: "daemon-reload",
            unit: String::new(),
            detail: failure_detail(&output),
        })
    }

    fn register(&self, id: &ServiceId, location: &Path) -> Result<PathBuf, SupervisorError> {
        let contents = self.renderer.render(id, location)?;
        if !self.unit_dir.exists() {
            fs::create_dir_all(&self.unit_dir).map_err(|e| io_err(&self.unit_dir, e))?;
        }
        let path = self.unit_path(id);
        let tmp = path.with_extension("service.tmp");
        fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
        set_unit_permissions(&tmp)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        tracing::info!(%id, unit = %path.display(), "unit definition written");
        Ok(path)
    }

    fn unit_installed(&self, id: &ServiceId) -> bool {
        self.unit_path(id).is_file()
    }

    fn unregister(&self, id: &ServiceId) -> Result<(), SupervisorError> {
        let path = self.unit_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SupervisorError::UnitNotFound { path })
            }
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

fn unit_name(id: &ServiceId) -> String {
    format!("{id}.service")
}

fn failure_detail(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let detail = format!("{stdout} {stderr}").trim().to_string();
    if detail.is_empty() {
        format!("exit status {}", output.status)
    } else {
        detail
    }
}

#[cfg(unix)]
fn set_unit_permissions(path: &Path) -> Result<(), SupervisorError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_unit_permissions(_path: &Path) -> Result<(), SupervisorError> {
    Ok(())
}
