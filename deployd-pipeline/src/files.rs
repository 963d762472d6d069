//! Listing and deleting files inside a service's artifact directory.
//!
//! Files are addressed by an opaque token: the path relative to the artifact
//! directory, base64 URL-safe without padding, so it crosses URL and JSON
//! boundaries unchanged.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use walkdir::WalkDir;

use deployd_core::{Layout, ServiceId, ServiceRegistry};

use crate::error::{io_err, walk_io, DeployError, PathError};
use crate::locks::IdLocks;
use crate::sanitize::resolve_within;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceFile {
    /// Path relative to the artifact directory, `/`-separated.
    pub name: String,
    pub token: String,
    pub size: u64,
}

pub fn encode_token(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(name.as_bytes())
}

pub fn decode_token(token: &str) -> Result<String, PathError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| PathError::BadToken(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PathError::BadToken(e.to_string()))
}

pub struct FileManager {
    layout: Layout,
    registry: Arc<ServiceRegistry>,
    locks: Arc<IdLocks>,
}

impl FileManager {
    pub fn new(layout: Layout, registry: Arc<ServiceRegistry>, locks: Arc<IdLocks>) -> Self {
        Self {
            layout,
            registry,
            locks,
        }
    }

    /// Every regular file under the artifact directory, sorted by name.
    pub fn list_files(&self, id: &ServiceId) -> Result<Vec<ServiceFile>, DeployError> {
        self.ensure_managed(id)?;
        let root = self.layout.service_dir(id);

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let (path, source) = walk_io(&root, e);
                DeployError::Io { path, source }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(ServiceFile {
                token: encode_token(&name),
                name,
                size,
            });
        }
        Ok(files)
    }

    /// Remove the single file named by `token`. Returns its decoded name.
    pub fn delete_file(&self, id: &ServiceId, token: &str) -> Result<String, DeployError> {
        self.ensure_managed(id)?;
        let name = decode_token(token)?;
        let root = self.layout.service_dir(id);
        let target = resolve_within(&root, &name)?;

        self.locks.with_lock(id, || {
            if !is_regular_file(&target) {
                return Err(DeployError::FileNotFound(name.clone()));
            }
            fs::remove_file(&target).map_err(|e| io_err(&target, e))?;
            tracing::info!(service = %id, file = %name, "file deleted");
            Ok(name.clone())
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

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).map_or(false, |m| m.file_type().is_file())
}
