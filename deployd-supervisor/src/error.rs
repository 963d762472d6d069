use std::path::PathBuf;

use thiserror::Error;

/// Error surface for supervisor calls and unit definition management.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor ran but reported failure; `detail` is its own output.
    #[error("{action} {unit} failed: {detail}")]
    Command {
        action: &'static str,
        unit: String,
        detail: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unit template error: {0}")]
    Template(#[from] tera::Error),

    #[error("unit definition not found: {path}")]
    UnitNotFound { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SupervisorError {
    SupervisorError::Io {
        path: path.into(),
        source,
    }
}
