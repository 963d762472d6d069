//! Domain types for the deployd service registry.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Persisted types are serializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceIdError;
use crate::layout::Layout;

/// Port the management surface binds to when nothing has been persisted yet.
pub const DEFAULT_PORT: u16 = 8181;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a managed service.
///
/// The same string names the artifact directory, the supervisor unit and the
/// persisted record, so it is validated on construction: non-empty, no path
/// separators, no `..`, no NUL. A leading `-` is refused so the ID can never
/// be read as an option by `systemctl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ServiceIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ServiceIdError::Empty);
        }
        if raw == "."
            || raw.starts_with('-')
            || raw.contains("..")
            || raw.contains(&['/', '\\', '\0'][..])
        {
            return Err(ServiceIdError::Invalid(raw));
        }
        Ok(Self(raw))
    }

    /// Derive an ID from the declared file name of an uploaded artifact.
    ///
    /// Takes the base name, drops a trailing `.zip` (any case) and removes
    /// every whitespace character.
    pub fn from_artifact_name(declared: &str) -> Result<Self, ServiceIdError> {
        let base = declared.rsplit(&['/', '\\'][..]).next().unwrap_or(declared);
        let id: String = strip_zip_suffix(base)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        Self::parse(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn strip_zip_suffix(name: &str) -> &str {
    let cut = name.len().saturating_sub(4);
    match name.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".zip") => &name[..cut],
        _ => name,
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServiceId {
    type Err = ServiceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = ServiceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A service managed by deployd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    /// Absolute path to the installed artifact directory. Always
    /// [`Layout::service_dir`] of `id`; build records with [`Service::new`].
    pub location: PathBuf,
    /// Last successful install or file update. Lifecycle operations never
    /// move it.
    pub timestamp: DateTime<Utc>,
}

impl Service {
    pub fn new(id: ServiceId, layout: &Layout, timestamp: DateTime<Utc>) -> Self {
        let location = layout.service_dir(&id);
        Self {
            id,
            location,
            timestamp,
        }
    }
}

/// Host-wide settings, persisted as a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub port: u16,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_matches_input() {
        assert_eq!(ServiceId::parse("billing").unwrap().to_string(), "billing");
    }

    #[test]
    fn artifact_name_strips_zip_and_whitespace() {
        let id = ServiceId::from_artifact_name("my service.ZIP").unwrap();
        assert_eq!(id.as_str(), "myservice");
    }

    #[test]
    fn artifact_name_uses_base_name_only() {
        let id = ServiceId::from_artifact_name("C:\\uploads\\api.zip").unwrap();
        assert_eq!(id.as_str(), "api");
        let id = ServiceId::from_artifact_name("/tmp/uploads/worker.zip").unwrap();
        assert_eq!(id.as_str(), "worker");
    }

    #[test]
    fn artifact_name_of_only_whitespace_is_empty() {
        assert_eq!(
            ServiceId::from_artifact_name("   .zip"),
            Err(ServiceIdError::Empty)
        );
    }

    #[test]
    fn artifact_name_with_leading_dash_is_rejected() {
        assert_eq!(
            ServiceId::from_artifact_name("--force.zip"),
            Err(ServiceIdError::Invalid("--force".into()))
        );
    }

    #[test]
    fn id_serde_rejects_traversal() {
        let yaml = "id: ../etc\nlocation: /x\ntimestamp: 2024-01-01T00:00:00Z\n";
        assert!(serde_yaml::from_str::<Service>(yaml).is_err());
    }

    #[test]
    fn service_location_derives_from_layout() {
        let layout = Layout::new("/opt/deployserver");
        let id = ServiceId::parse("api").unwrap();
        let service = Service::new(id, &layout, Utc::now());
        assert_eq!(
            service.location,
            PathBuf::from("/opt/deployserver/services/api")
        );
    }

    #[test]
    fn settings_default_port() {
        assert_eq!(GlobalSettings::default().port, 8181);
    }
}
