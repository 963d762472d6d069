//! Unit definition rendering with Tera.
//!
//! One built-in template ships in the binary; operators can replace it with
//! their own file. Both see the same context: `id` and `location`.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use deployd_core::ServiceId;

use crate::error::{io_err, SupervisorError};

const UNIT_TEMPLATE: &str = "unit.service";
const BUILTIN: &str = include_str!("templates/unit.service.tera");

#[derive(Serialize)]
struct UnitContext<'a> {
    id: &'a str,
    location: String,
}

/// Renders supervisor unit definitions for managed services.
pub struct UnitRenderer {
    tera: Tera,
}

impl UnitRenderer {
    pub fn builtin() -> Result<Self, SupervisorError> {
        Self::from_template(BUILTIN)
    }

    /// Use the template at `path` instead of the built-in one.
    pub fn from_file(path: &Path) -> Result<Self, SupervisorError> {
        let source = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::from_template(&source)
    }

    pub fn from_template(source: &str) -> Result<Self, SupervisorError> {
        let mut tera = Tera::default();
        tera.add_raw_template(UNIT_TEMPLATE, source)?;
        Ok(Self { tera })
    }

    pub fn render(&self, id: &ServiceId, location: &Path) -> Result<String, SupervisorError> {
        let ctx = Context::from_serialize(UnitContext {
            id: id.as_str(),
            location: location.display().to_string(),
        })?;
        Ok(self.tera.render(UNIT_TEMPLATE, &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ServiceId {
        ServiceId::parse(raw).unwrap()
    }

    #[test]
    fn builtin_runs_executable_named_after_id() {
        let renderer = UnitRenderer::builtin().unwrap();
        let unit = renderer
            .render(&id("api"), Path::new("/opt/deployserver/services/api"))
            .unwrap();
        assert!(unit.contains("ExecStart=/opt/deployserver/services/api/api"));
        assert!(unit.contains("WorkingDirectory=/opt/deployserver/services/api"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn custom_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.tera");
        fs::write(&path, "[Service]\nExecStart={{ location }}/run --name {{ id }}\n").unwrap();

        let renderer = UnitRenderer::from_file(&path).unwrap();
        let unit = renderer.render(&id("worker"), Path::new("/srv/worker")).unwrap();
        assert_eq!(unit, "[Service]\nExecStart=/srv/worker/run --name worker\n");
    }

    #[test]
    fn broken_template_is_rejected() {
        assert!(matches!(
            UnitRenderer::from_template("{{ id"),
            Err(SupervisorError::Template(_))
        ));
    }

    #[test]
    fn missing_template_file_is_io_error() {
        let err = UnitRenderer::from_file(Path::new("/nonexistent/unit.tera"))
            .err()
            .unwrap();
        assert!(matches!(err, SupervisorError::Io { .. }));
    }
}
