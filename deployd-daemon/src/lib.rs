//! deployd daemon: serves the service manager over newline-delimited JSON
//! on TCP.

pub mod config;
mod error;
mod handler;
pub mod protocol;
mod runtime;

pub use config::{bootstrap, bootstrap_with, resolve_port, Bootstrapped, DaemonConfig};
pub use error::DaemonError;
pub use handler::dispatch;
pub use protocol::{request, send_request, Request, Response};
pub use runtime::{run, serve, start_blocking};
