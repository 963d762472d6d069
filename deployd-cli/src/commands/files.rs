//! Listings (`list`, `files`, `backups`) and `delete-file`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use deployd_core::Service;
use deployd_daemon::Request;

use super::client::call;
use super::service::IdArgs;

#[derive(Args, Debug)]
pub struct ListingArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeleteFileArgs {
    /// Managed service ID.
    pub id: String,

    /// Token from `deployd files`.
    pub token: String,
}

impl DeleteFileArgs {
    pub fn run(self, addr: SocketAddr) -> Result<()> {
        let data = call(
            addr,
            Request::DeleteFile {
                id: self.id.clone(),
                token: self.token,
            },
        )?;
        let name = data["deleted"].as_str().unwrap_or_default();
        println!("{} deleted {} from {}", "■".green().bold(), name, self.id.bold());
        Ok(())
    }
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "deployed")]
    deployed: String,
}

#[derive(Deserialize, Tabled)]
struct FileRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "size")]
    size: u64,
    #[tabled(rename = "token")]
    token: String,
}

#[derive(Deserialize, Tabled)]
struct SnapshotRow {
    #[tabled(rename = "snapshot")]
    name: String,
    #[tabled(rename = "size")]
    size: u64,
}

pub fn list_services(addr: SocketAddr, args: ListingArgs) -> Result<()> {
    let data = call(addr, Request::List)?;
    if args.json {
        return print_json(&data);
    }

    let services: Vec<Service> =
        serde_json::from_value(data).context("unexpected list payload from daemon")?;
    if services.is_empty() {
        println!("no managed services");
        return Ok(());
    }
    let rows: Vec<ServiceRow> = services
        .into_iter()
        .map(|s| ServiceRow {
            id: s.id.to_string(),
            location: s.location.display().to_string(),
            deployed: format_age(s.timestamp),
        })
        .collect();
    print_table(rows);
    Ok(())
}

pub fn list_files(addr: SocketAddr, id: IdArgs, args: ListingArgs) -> Result<()> {
    let data = call(addr, Request::Files { id: id.id })?;
    if args.json {
        return print_json(&data);
    }
    let rows: Vec<FileRow> =
        serde_json::from_value(data).context("unexpected files payload from daemon")?;
    if rows.is_empty() {
        println!("no files");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

pub fn list_backups(addr: SocketAddr, id: IdArgs, args: ListingArgs) -> Result<()> {
    let data = call(addr, Request::Backups { id: id.id })?;
    if args.json {
        return print_json(&data);
    }
    let rows: Vec<SnapshotRow> =
        serde_json::from_value(data).context("unexpected backups payload from daemon")?;
    if rows.is_empty() {
        println!("no backups");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_json(data: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(data).context("failed to render JSON")?
    );
    Ok(())
}

fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    let age = match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    };
    format!("{} ({age})", at.format("%Y-%m-%d %H:%M:%S UTC"))
}
