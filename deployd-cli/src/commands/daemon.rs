//! `deployd daemon`: run the server in the foreground.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use deployd_daemon::{start_blocking, DaemonConfig};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Base directory for artifacts, backups and records.
    #[arg(long, env = "DEPLOYD_ROOT", default_value = "/opt/deployserver")]
    pub root: PathBuf,

    /// Directory unit definitions are written to.
    #[arg(long, env = "DEPLOYD_UNIT_DIR", default_value = "/lib/systemd/system")]
    pub unit_dir: PathBuf,

    /// Tera template replacing the built-in unit definition.
    #[arg(long, env = "DEPLOYD_UNIT_TEMPLATE")]
    pub unit_template: Option<PathBuf>,

    /// systemctl binary to run.
    #[arg(long, env = "DEPLOYD_SYSTEMCTL", default_value = "systemctl")]
    pub systemctl: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "DEPLOYD_BIND", default_value = "127.0.0.1")]
    pub bind: IpAddr,

    /// Port to listen on; persisted for later runs. Defaults to the stored
    /// port, or 8181 on first run.
    #[arg(long, env = "DEPLOYD_PORT")]
    pub port: Option<u16>,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let config = DaemonConfig {
            root: self.root,
            unit_dir: self.unit_dir,
            unit_template: self.unit_template,
            systemctl: self.systemctl,
            bind: self.bind,
            port: self.port,
        };
        start_blocking(config).context("daemon exited with error")
    }
}
