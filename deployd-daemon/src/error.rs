use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime and its client protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record store error: {0}")]
    Store(#[from] deployd_core::StoreError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] deployd_supervisor::SupervisorError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (nothing listening on {addr})")]
    DaemonNotRunning { addr: SocketAddr },

    /// The daemon handled the request and reported failure.
    #[error("{message}")]
    Remote {
        kind: Option<String>,
        message: String,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
