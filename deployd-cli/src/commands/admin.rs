//! Daemon-wide commands with no service ID.

use std::net::SocketAddr;

use anyhow::Result;
use colored::Colorize;

use deployd_daemon::Request;

use super::client::call;

pub fn reload(addr: SocketAddr) -> Result<()> {
    call(addr, Request::Reload)?;
    println!("{} supervisor reloaded", "■".green().bold());
    Ok(())
}

pub fn resync(addr: SocketAddr) -> Result<()> {
    let data = call(addr, Request::Resync)?;
    let count = data["services"].as_u64().unwrap_or(0);
    println!("{} registry resynced: {count} service(s)", "■".green().bold());
    Ok(())
}

pub fn shutdown(addr: SocketAddr) -> Result<()> {
    call(addr, Request::Shutdown)?;
    println!("daemon stop requested");
    Ok(())
}
