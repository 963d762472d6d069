use std::path::{Path, PathBuf};

use thiserror::Error;

use deployd_core::{ServiceId, StoreError};
use deployd_supervisor::SupervisorError;

/// Failures reading, extracting or producing a zip artifact.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not a zip archive: {0}")]
    Malformed(#[source] zip::result::ZipError),

    #[error("archive has no entries")]
    Empty,

    #[error("unsafe entry name: {0}")]
    UnsafeEntry(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rejections from [`crate::sanitize::resolve_within`] and token decoding.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("empty file name")]
    Empty,

    #[error("malformed file token: {0}")]
    BadToken(String),

    #[error("parent directory traversal in {0:?}")]
    Traversal(String),

    #[error("absolute path not allowed: {0:?}")]
    Absolute(String),

    #[error("{0:?} resolves outside the service directory")]
    Escape(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every failure an outward operation can report.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("service not managed: {0}")]
    NotManaged(String),

    #[error("bad artifact: {0}")]
    BadArtifact(String),

    #[error("archival of {id} failed: {source}")]
    ArchivalFailed {
        id: ServiceId,
        #[source]
        source: ArchiveError,
    },

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid path: {0}")]
    InvalidPath(#[source] PathError),

    #[error("unit definition not found for {0}")]
    UnitNotFound(ServiceId),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no backup snapshot {name} for {id}")]
    SnapshotNotFound { id: ServiceId, name: String },
}

impl DeployError {
    pub fn not_managed(id: &ServiceId) -> Self {
        DeployError::NotManaged(id.to_string())
    }

    /// Stable snake_case code for the error, for callers that branch on it.
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::NotManaged(_) => "not_managed",
            DeployError::BadArtifact(_) => "bad_artifact",
            DeployError::ArchivalFailed { .. } => "archival_failed",
            DeployError::Supervisor(_) => "supervisor",
            DeployError::Io { .. } => "io",
            DeployError::Persistence(_) => "persistence",
            DeployError::InvalidPath(_) => "invalid_path",
            DeployError::UnitNotFound(_) => "unit_not_found",
            DeployError::FileNotFound(_) => "file_not_found",
            DeployError::SnapshotNotFound { .. } => "snapshot_not_found",
        }
    }
}

/// A name that failed to resolve because the filesystem could not be read
/// is an I/O failure, not a bad name.
impl From<PathError> for DeployError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Io { path, source } => DeployError::Io { path, source },
            other => DeployError::InvalidPath(other),
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn archive_io(path: impl Into<PathBuf>, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.into(),
        source,
    }
}

/// Flatten a walkdir failure into a path-annotated I/O error.
pub(crate) fn walk_io(root: &Path, err: walkdir::Error) -> (PathBuf, std::io::Error) {
    let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
    (path, std::io::Error::from(err))
}
