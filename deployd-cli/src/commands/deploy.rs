//! `deployd install|update|rollback`: artifact-changing commands.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use deployd_daemon::Request;

use super::client::call;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Zip archive to install.
    pub archive: PathBuf,

    /// Declared artifact name the service ID is derived from. Defaults to
    /// the archive's file name.
    #[arg(long)]
    pub name: Option<String>,
}

impl InstallArgs {
    pub fn run(self, addr: SocketAddr) -> Result<()> {
        let archive = absolute(&self.archive)?;
        let service = call(
            addr,
            Request::Install {
                archive,
                name: self.name,
            },
        )?;
        println!(
            "{} installed {} at {}",
            "■".green().bold(),
            field(&service, "id").bold(),
            field(&service, "location")
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Managed service ID.
    pub id: String,

    /// Local file with the new content.
    pub file: PathBuf,

    /// Name to store the file under inside the service. Defaults to the
    /// local file's name.
    #[arg(long)]
    pub name: Option<String>,
}

impl UpdateArgs {
    pub fn run(self, addr: SocketAddr) -> Result<()> {
        let file = absolute(&self.file)?;
        call(
            addr,
            Request::Update {
                id: self.id.clone(),
                file,
                name: self.name,
            },
        )?;
        println!("{} updated {}", "■".green().bold(), self.id.bold());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Managed service ID.
    pub id: String,

    /// Snapshot name from `deployd backups`. Defaults to the newest.
    #[arg(long)]
    pub snapshot: Option<String>,
}

impl RollbackArgs {
    pub fn run(self, addr: SocketAddr) -> Result<()> {
        call(
            addr,
            Request::Rollback {
                id: self.id.clone(),
                snapshot: self.snapshot.clone(),
            },
        )?;
        let from = self.snapshot.as_deref().unwrap_or("newest snapshot");
        println!("{} rolled back {} from {from}", "■".green().bold(), self.id.bold());
        Ok(())
    }
}

/// The daemon resolves paths from its own working directory.
fn absolute(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("cannot read {}", path.display()))
}

fn field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_string()
}
