//! Shared request plumbing for client subcommands.

use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use deployd_daemon::{request, DaemonError, Request};

/// Send `req` and return its data, turning daemon-side failures into
/// readable errors tagged with their kind.
pub fn call(addr: SocketAddr, req: Request) -> Result<Value> {
    let cmd = req.name();
    match request(addr, &req) {
        Ok(data) => Ok(data),
        Err(DaemonError::DaemonNotRunning { addr }) => Err(anyhow!(
            "daemon is not running at {addr} (start it with `deployd daemon`)"
        )),
        Err(DaemonError::Remote {
            kind: Some(kind),
            message,
        }) => Err(anyhow!("{cmd} failed [{kind}]: {message}")),
        Err(err) => Err(err).with_context(|| format!("{cmd} request failed")),
    }
}
