//! Uploaded artifact validation and extraction.
//!
//! An artifact is a zip archive with at least one entry. Extraction is
//! best-effort per entry: a bad entry is reported to the error sink and
//! skipped, the rest of the archive still lands.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use deployd_core::ErrorSink;

use crate::error::{archive_io, ArchiveError};

/// Counts from one extraction run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    pub dirs: usize,
    pub files: usize,
    pub skipped: usize,
}

pub struct Artifact {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Artifact {
    /// Validate `bytes` as a non-empty zip archive. No side effects.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Malformed)?;
        if archive.is_empty() {
            return Err(ArchiveError::Empty);
        }
        Ok(Self { archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Extract into `dest`, which must already exist.
    ///
    /// Directory entries are created in a first pass and files written in a
    /// second. Stored unix modes are applied; directory modes last, so a
    /// read-only directory does not block its own contents.
    pub fn extract(&mut self, dest: &Path, sink: &dyn ErrorSink) -> Extracted {
        let mut report = Extracted::default();
        let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

        for index in 0..self.archive.len() {
            match self.extract_dir(index, dest) {
                Ok(Some((path, mode))) => {
                    report.dirs += 1;
                    if let Some(mode) = mode {
                        dir_modes.push((path, mode));
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    sink.report("artifact extract", &err);
                    report.skipped += 1;
                }
            }
        }

        for index in 0..self.archive.len() {
            match self.extract_file(index, dest) {
                Ok(true) => report.files += 1,
                Ok(false) => {}
                Err(err) => {
                    sink.report("artifact extract", &err);
                    report.skipped += 1;
                }
            }
        }

        for (path, mode) in dir_modes.into_iter().rev() {
            if let Err(err) = set_mode(&path, mode) {
                sink.report("artifact extract", &err);
            }
        }

        tracing::debug!(
            dest = %dest.display(),
            dirs = report.dirs,
            files = report.files,
            skipped = report.skipped,
            "artifact extracted"
        );
        report
    }

    /// Create the directory for entry `index`, if it is one.
    fn extract_dir(
        &mut self,
        index: usize,
        dest: &Path,
    ) -> Result<Option<(PathBuf, Option<u32>)>, ArchiveError> {
        let entry = self.archive.by_index(index)?;
        if !entry.is_dir() {
            return Ok(None);
        }
        let relative = enclosed(entry.enclosed_name(), entry.name())?;
        let path = dest.join(relative);
        fs::create_dir_all(&path).map_err(|e| archive_io(&path, e))?;
        Ok(Some((path, entry.unix_mode().map(permission_bits))))
    }

    /// Write the file for entry `index`, if it is one.
    fn extract_file(&mut self, index: usize, dest: &Path) -> Result<bool, ArchiveError> {
        let mut entry = self.archive.by_index(index)?;
        if entry.is_dir() {
            return Ok(false);
        }
        let relative = enclosed(entry.enclosed_name(), entry.name())?;
        let path = dest.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| archive_io(parent, e))?;
        }
        let mut out = File::create(&path).map_err(|e| archive_io(&path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| archive_io(&path, e))?;
        if let Some(mode) = entry.unix_mode() {
            set_mode(&path, permission_bits(mode))?;
        }
        Ok(true)
    }
}

fn enclosed(name: Option<PathBuf>, raw: &str) -> Result<PathBuf, ArchiveError> {
    match name {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Err(ArchiveError::UnsafeEntry(raw.to_string())),
    }
}

fn permission_bits(mode: u32) -> u32 {
    mode & 0o7777
}

#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<(), ArchiveError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| archive_io(path, e))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<(), ArchiveError> {
    Ok(())
}
