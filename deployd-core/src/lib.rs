//! deployd core library: domain types, layout, record store, service registry.
//!
//! - [`types`]: [`ServiceId`], [`Service`], [`GlobalSettings`]
//! - [`layout`]: where artifacts, backups and records live on disk
//! - [`store`]: the [`RecordStore`] capability plus YAML and in-memory stores
//! - [`registry`]: the concurrency-safe [`ServiceRegistry`]
//! - [`settings`]: first-run initialisation of [`GlobalSettings`]
//! - [`sink`]: [`ErrorSink`] for log-and-continue failures

pub mod error;
pub mod layout;
pub mod registry;
pub mod settings;
pub mod sink;
pub mod store;
pub mod types;

pub use error::{ServiceIdError, StoreError};
pub use layout::Layout;
pub use registry::ServiceRegistry;
pub use sink::{ErrorSink, RecordingSink, TracingSink};
pub use store::{MemoryStore, RecordStore, YamlStore};
pub use types::{GlobalSettings, Service, ServiceId, DEFAULT_PORT};
