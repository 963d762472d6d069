//! Point-in-time zip snapshots of a service's artifact directory.
//!
//! Snapshots live at `<backups>/<ID>/<RFC3339 nanos>.zip`. Entries are
//! relative to the artifact directory, so a snapshot is itself a valid
//! install artifact.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use deployd_core::{Layout, ServiceId};

use crate::error::{archive_io, walk_io, ArchiveError};

const SNAPSHOT_EXT: &str = "zip";
const CREATE_ATTEMPTS: usize = 8;

/// A stored snapshot, as listed for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// File stem; also the RFC 3339 time it was taken.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Archive the whole artifact directory of `id`. Returns the snapshot path.
///
/// A missing artifact directory is an error. A partially written snapshot is
/// removed before the error is returned.
pub fn snapshot(layout: &Layout, id: &ServiceId) -> Result<PathBuf, ArchiveError> {
    let source = layout.service_dir(id);
    if !source.is_dir() {
        return Err(archive_io(
            &source,
            io::Error::new(io::ErrorKind::NotFound, "artifact directory missing"),
        ));
    }

    let backup_dir = layout.backup_dir(id);
    fs::create_dir_all(&backup_dir).map_err(|e| archive_io(&backup_dir, e))?;
    let (path, file) = create_snapshot_file(&backup_dir)?;

    if let Err(err) = write_tree(&source, file) {
        let _ = fs::remove_file(&path);
        return Err(err);
    }
    tracing::info!(service = %id, snapshot = %path.display(), "artifact directory archived");
    Ok(path)
}

/// Every snapshot for `id`, newest first. No backup directory means none.
pub fn list(layout: &Layout, id: &ServiceId) -> Result<Vec<Snapshot>, ArchiveError> {
    let dir = layout.backup_dir(id);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(archive_io(&dir, e)),
    };

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| archive_io(&dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXT) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let meta = entry.metadata().map_err(|e| archive_io(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        snapshots.push(Snapshot {
            name,
            path,
            size: meta.len(),
        });
    }
    // RFC 3339 UTC with fixed-width nanos sorts chronologically as text.
    snapshots.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(snapshots)
}

/// Open a new, uniquely named snapshot file. Never overwrites.
fn create_snapshot_file(dir: &Path) -> Result<(PathBuf, File), ArchiveError> {
    let mut last_err = None;
    for _ in 0..CREATE_ATTEMPTS {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let path = dir.join(format!("{stamp}.{SNAPSHOT_EXT}"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some((path, e)),
            Err(e) => return Err(archive_io(&path, e)),
        }
    }
    let (path, err) = last_err.unwrap_or_else(|| {
        (
            dir.to_path_buf(),
            io::Error::new(io::ErrorKind::AlreadyExists, "snapshot name collision"),
        )
    });
    Err(archive_io(path, err))
}

fn write_tree(source: &Path, file: File) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(file);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_err(source, e))?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");
        let meta = entry.metadata().map_err(|e| walk_err(source, e))?;
        let options = base.unix_permissions(mode_of(&meta));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut input = File::open(path).map_err(|e| archive_io(path, e))?;
            io::copy(&mut input, &mut zip).map_err(|e| archive_io(path, e))?;
        } else {
            tracing::debug!(path = %path.display(), "skipping non-regular entry in snapshot");
        }
    }

    zip.finish()?;
    Ok(())
}

fn walk_err(root: &Path, err: walkdir::Error) -> ArchiveError {
    let (path, io_error) = walk_io(root, err);
    archive_io(path, io_error)
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn id(raw: &str) -> ServiceId {
        ServiceId::parse(raw).unwrap()
    }

    fn seeded(root: &Path) -> Layout {
        let layout = Layout::new(root);
        let dir = layout.service_dir(&id("api"));
        fs::create_dir_all(dir.join("conf")).unwrap();
        fs::write(dir.join("api"), "v1").unwrap();
        fs::write(dir.join("conf/app.toml"), "port = 1").unwrap();
        layout
    }

    #[test]
    fn snapshot_preserves_relative_structure() {
        let root = tempfile::tempdir().unwrap();
        let layout = seeded(root.path());

        let path = snapshot(&layout, &id("api")).unwrap();
        assert!(path.starts_with(layout.backup_dir(&id("api"))));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"conf/".to_string()), "names: {names:?}");
        assert!(names.contains(&"conf/app.toml".to_string()));
        assert!(names.contains(&"api".to_string()));

        let mut body = String::new();
        archive
            .by_name("conf/app.toml")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "port = 1");
    }

    #[test]
    fn missing_directory_fails_without_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::new(root.path());
        assert!(matches!(
            snapshot(&layout, &id("ghost")),
            Err(ArchiveError::Io { .. })
        ));
        assert!(list(&layout, &id("ghost")).unwrap().is_empty());
    }

    #[test]
    fn snapshots_never_collide_and_list_newest_first() {
        let root = tempfile::tempdir().unwrap();
        let layout = seeded(root.path());

        let first = snapshot(&layout, &id("api")).unwrap();
        let second = snapshot(&layout, &id("api")).unwrap();
        assert_ne!(first, second);

        let listed = list(&layout, &id("api")).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].path, second);
        assert_eq!(listed[1].path, first);
        assert!(listed[0].size > 0);
    }
}
