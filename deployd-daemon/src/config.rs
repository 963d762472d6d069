//! Daemon configuration and startup wiring.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use deployd_core::layout::DEFAULT_ROOT;
use deployd_core::{settings, ErrorSink, Layout, RecordStore, ServiceRegistry, TracingSink, YamlStore};
use deployd_pipeline::ServiceManager;
use deployd_supervisor::systemd::{DEFAULT_PROGRAM, DEFAULT_UNIT_DIR};
use deployd_supervisor::{Supervisor, Systemd, UnitRenderer};

use crate::error::DaemonError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub root: PathBuf,
    pub unit_dir: PathBuf,
    /// Replaces the built-in unit template when set.
    pub unit_template: Option<PathBuf>,
    pub systemctl: PathBuf,
    pub bind: IpAddr,
    /// Explicit port; persisted when it differs from the stored one.
    pub port: Option<u16>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
            unit_template: None,
            systemctl: PathBuf::from(DEFAULT_PROGRAM),
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
        }
    }
}

/// Everything the server needs, built from a [`DaemonConfig`].
pub struct Bootstrapped {
    pub manager: Arc<ServiceManager>,
    pub addr: SocketAddr,
}

/// Build the systemd-backed manager described by `config`.
pub fn bootstrap(config: &DaemonConfig) -> Result<Bootstrapped, DaemonError> {
    let renderer = match &config.unit_template {
        Some(path) => UnitRenderer::from_file(path)?,
        None => UnitRenderer::builtin()?,
    };
    let systemd = Systemd::new(&config.unit_dir, renderer).with_program(&config.systemctl);
    tracing::debug!(
        unit_dir = %systemd.unit_dir().display(),
        systemctl = %config.systemctl.display(),
        "systemd adapter configured"
    );
    bootstrap_with(config, Arc::new(systemd))
}

/// Same as [`bootstrap`] over any supervisor.
pub fn bootstrap_with(
    config: &DaemonConfig,
    supervisor: Arc<dyn Supervisor>,
) -> Result<Bootstrapped, DaemonError> {
    let layout = Layout::new(&config.root);
    let store: Arc<dyn RecordStore> = Arc::new(YamlStore::new(layout.data_dir()));
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingSink);

    let port = resolve_port(store.as_ref(), config.port)?;
    let registry = Arc::new(ServiceRegistry::open(store, sink.clone()));
    tracing::info!(
        root = %layout.root().display(),
        services = registry.len(),
        port,
        "registry loaded"
    );

    let manager = ServiceManager::new(layout, registry, supervisor, sink);
    Ok(Bootstrapped {
        manager: Arc::new(manager),
        addr: SocketAddr::new(config.bind, port),
    })
}

/// Persisted port unless `explicit` overrides it; first run persists the
/// default.
pub fn resolve_port(store: &dyn RecordStore, explicit: Option<u16>) -> Result<u16, DaemonError> {
    let current = settings::load_or_init(store)?;
    match explicit {
        Some(port) if port != current.port => Ok(settings::set_port(store, port)?.port),
        _ => Ok(current.port),
    }
}
