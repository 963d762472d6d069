//! Global settings record (currently just the management port).

use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::GlobalSettings;

/// Load the persisted settings, creating them with defaults on first run.
pub fn load_or_init(store: &dyn RecordStore) -> Result<GlobalSettings, StoreError> {
    if let Some(settings) = store.load_settings()? {
        return Ok(settings);
    }
    let settings = GlobalSettings::default();
    store.save_settings(&settings)?;
    tracing::info!(port = settings.port, "initialised global settings");
    Ok(settings)
}

/// Persist a new management port and return the updated settings.
pub fn set_port(store: &dyn RecordStore, port: u16) -> Result<GlobalSettings, StoreError> {
    let mut settings = store.load_settings()?.unwrap_or_default();
    settings.port = port;
    store.save_settings(&settings)?;
    Ok(settings)
}
