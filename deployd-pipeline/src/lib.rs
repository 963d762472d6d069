//! deployd-pipeline: everything that changes a service's artifact tree or
//! supervisor state.
//!
//! [`ServiceManager`] is the entry point; it wires the [`Pipeline`],
//! [`LifecycleController`] and [`FileManager`] over one shared registry and
//! supervisor.

pub mod archiver;
pub mod artifact;
pub mod deploy;
pub mod error;
pub mod files;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod sanitize;

pub use archiver::Snapshot;
pub use artifact::{Artifact, Extracted};
pub use deploy::{Pipeline, EXECUTABLE_MODE, UPDATED_FILE_MODE};
pub use error::{ArchiveError, DeployError, PathError};
pub use files::{decode_token, encode_token, FileManager, ServiceFile};
pub use lifecycle::LifecycleController;
pub use locks::IdLocks;
pub use manager::ServiceManager;
pub use sanitize::resolve_within;
