//! Persistent record store capability and its implementations.
//!
//! # Storage layout ([`YamlStore`])
//!
//! ```text
//! <data>/
//!   services/
//!     <id>.yaml        (one Service record per file, mode 0600)
//!   settings.yaml      (GlobalSettings, mode 0600)
//! ```
//!
//! Writes are atomic: serialize → unique `.tmp` sibling → `chmod 0600` →
//! `rename`. The `.tmp` always lives next to the target so the rename never
//! crosses filesystems; the sequence number keeps concurrent writers of the
//! same record from sharing one.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{io_err, StoreError};
use crate::types::{GlobalSettings, Service, ServiceId};

/// Durable storage for [`Service`] records and [`GlobalSettings`].
pub trait RecordStore: Send + Sync {
    /// Every persisted service record.
    fn load_services(&self) -> Result<Vec<Service>, StoreError>;

    fn get_service(&self, id: &ServiceId) -> Result<Option<Service>, StoreError>;

    /// Insert or overwrite, keyed by `service.id`.
    fn save_service(&self, service: &Service) -> Result<(), StoreError>;

    /// Delete the record for `id`; deleting a missing record is not an error.
    fn delete_service(&self, id: &ServiceId) -> Result<(), StoreError>;

    fn load_settings(&self) -> Result<Option<GlobalSettings>, StoreError>;

    fn save_settings(&self, settings: &GlobalSettings) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// YamlStore
// ---------------------------------------------------------------------------

/// File-backed store: one YAML document per record.
#[derive(Debug, Clone)]
pub struct YamlStore {
    dir: PathBuf,
}

impl YamlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data>/services/<id>.yaml`. Pure, no I/O.
    pub fn record_path(&self, id: &ServiceId) -> PathBuf {
        self.services_dir().join(format!("{id}.yaml"))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join("settings.yaml")
    }

    fn services_dir(&self) -> PathBuf {
        self.dir.join("services")
    }
}

impl RecordStore for YamlStore {
    fn load_services(&self) -> Result<Vec<Service>, StoreError> {
        let dir = self.services_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(&dir, err)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut services = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(service) = read_yaml(&path)? {
                services.push(service);
            }
        }
        Ok(services)
    }

    fn get_service(&self, id: &ServiceId) -> Result<Option<Service>, StoreError> {
        read_yaml(&self.record_path(id))
    }

    fn save_service(&self, service: &Service) -> Result<(), StoreError> {
        write_yaml_atomic(&self.record_path(&service.id), service)
    }

    fn delete_service(&self, id: &ServiceId) -> Result<(), StoreError> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn load_settings(&self) -> Result<Option<GlobalSettings>, StoreError> {
        read_yaml(&self.settings_path())
    }

    fn save_settings(&self, settings: &GlobalSettings) -> Result<(), StoreError> {
        write_yaml_atomic(&self.settings_path(), settings)
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn write_yaml_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }

    let yaml = serde_yaml::to_string(value)?;
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("yaml.{seq}.tmp"));
    fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, err));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    services: Mutex<BTreeMap<ServiceId, Service>>,
    settings: Mutex<Option<GlobalSettings>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn load_services(&self) -> Result<Vec<Service>, StoreError> {
        let services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(services.values().cloned().collect())
    }

    fn get_service(&self, id: &ServiceId) -> Result<Option<Service>, StoreError> {
        let services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(services.get(id).cloned())
    }

    fn save_service(&self, service: &Service) -> Result<(), StoreError> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.id.clone(), service.clone());
        Ok(())
    }

    fn delete_service(&self, id: &ServiceId) -> Result<(), StoreError> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    fn load_settings(&self) -> Result<Option<GlobalSettings>, StoreError> {
        Ok(*self.settings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn save_settings(&self, settings: &GlobalSettings) -> Result<(), StoreError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(*settings);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use chrono::Utc;
    use tempfile::TempDir;

    fn service(id: &str) -> Service {
        Service::new(
            ServiceId::parse(id).unwrap(),
            &Layout::new("/opt/deployserver"),
            Utc::now(),
        )
    }

    #[test]
    fn record_path_is_keyed_by_id() {
        let store = YamlStore::new("/var/lib/deployd");
        let path = store.record_path(&ServiceId::parse("api").unwrap());
        assert_eq!(path, PathBuf::from("/var/lib/deployd/services/api.yaml"));
    }

    #[test]
    fn save_and_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        let svc = service("api");
        store.save_service(&svc).unwrap();
        assert_eq!(store.get_service(&svc.id).unwrap(), Some(svc));
    }

    #[test]
    fn save_overwrites_instead_of_duplicating() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        let mut svc = service("api");
        store.save_service(&svc).unwrap();
        svc.timestamp = svc.timestamp + chrono::Duration::seconds(5);
        store.save_service(&svc).unwrap();

        let all = store.load_services().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].timestamp, svc.timestamp);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        let svc = service("api");
        store.save_service(&svc).unwrap();
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("services"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), ".tmp must be gone after successful save");
    }

    #[test]
    #[cfg(unix)]
    fn record_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        let svc = service("api");
        store.save_service(&svc).unwrap();
        let mode = fs::metadata(store.record_path(&svc.id))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn load_services_empty_when_dir_missing() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path().join("nope"));
        assert!(store.load_services().unwrap().is_empty());
    }

    #[test]
    fn load_services_ignores_orphaned_tmp_files() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        store.save_service(&service("api")).unwrap();
        fs::write(
            tmp.path().join("services").join("worker.yaml.tmp"),
            "CRASH - INCOMPLETE WRITE",
        )
        .unwrap();
        assert_eq!(store.load_services().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_record_is_parse_error_with_path() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        let dir = tmp.path().join("services");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("api.yaml"), ": : not yaml [").unwrap();

        let err = store.load_services().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("api.yaml"));
    }

    #[test]
    fn delete_missing_record_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        store
            .delete_service(&ServiceId::parse("ghost").unwrap())
            .expect("idempotent delete");
    }

    #[test]
    fn settings_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = YamlStore::new(tmp.path());
        assert_eq!(store.load_settings().unwrap(), None);
        store.save_settings(&GlobalSettings { port: 9000 }).unwrap();
        assert_eq!(
            store.load_settings().unwrap(),
            Some(GlobalSettings { port: 9000 })
        );
    }

    #[test]
    fn memory_store_behaves_like_yaml_store() {
        let store = MemoryStore::new();
        let svc = service("api");
        store.save_service(&svc).unwrap();
        store.save_service(&svc).unwrap();
        assert_eq!(store.load_services().unwrap().len(), 1);
        store.delete_service(&svc.id).unwrap();
        assert_eq!(store.get_service(&svc.id).unwrap(), None);
    }
}
