//! On-disk layout of a deployd host.
//!
//! ```text
//! <root>/                      (default /opt/deployserver)
//!   services/<id>/             artifact directory, the service's Location
//!   backups/<id>/<ts>.zip      snapshots taken before destructive replacement
//!   data/services/<id>.yaml    persisted Service records
//!   data/settings.yaml         GlobalSettings
//! ```

use std::path::{Path, PathBuf};

use crate::types::ServiceId;

pub const DEFAULT_ROOT: &str = "/opt/deployserver";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn services_root(&self) -> PathBuf {
        self.root.join("services")
    }

    pub fn service_dir(&self, id: &ServiceId) -> PathBuf {
        self.services_root().join(id.as_str())
    }

    /// The primary executable: the file named exactly like the service.
    pub fn executable_path(&self, id: &ServiceId) -> PathBuf {
        self.service_dir(id).join(id.as_str())
    }

    pub fn backups_root(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn backup_dir(&self, id: &ServiceId) -> PathBuf {
        self.backups_root().join(id.as_str())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let layout = Layout::new("/srv/d");
        let id = ServiceId::parse("api").unwrap();
        assert_eq!(layout.service_dir(&id), PathBuf::from("/srv/d/services/api"));
        assert_eq!(
            layout.executable_path(&id),
            PathBuf::from("/srv/d/services/api/api")
        );
        assert_eq!(layout.backup_dir(&id), PathBuf::from("/srv/d/backups/api"));
        assert_eq!(layout.data_dir(), PathBuf::from("/srv/d/data"));
    }
}
