//! deployd: single-host service registry and deployment pipeline.
//!
//! # Usage
//!
//! ```text
//! deployd daemon [--root <dir>] [--unit-dir <dir>] [--port <n>] ...
//! deployd install <archive.zip> [--name <declared name>]
//! deployd update <id> <file> [--name <stored name>]
//! deployd remove|start|stop|enable|disable|status|is-running|is-enabled <id>
//! deployd rollback <id> [--snapshot <name>]
//! deployd list|files <id>|backups <id> [--json]
//! deployd delete-file <id> <token>
//! deployd reload|resync|shutdown
//! ```
//!
//! Every command except `daemon` talks to a running daemon at `--addr`.

mod commands;

use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonArgs,
    deploy::{InstallArgs, RollbackArgs, UpdateArgs},
    files::{DeleteFileArgs, ListingArgs},
    service::{IdArgs, ServiceCommand},
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "deployd",
    version,
    about = "Install, update and supervise services on a single systemd host",
    long_about = None,
)]
struct Cli {
    /// Address of the running daemon.
    #[arg(
        long,
        global = true,
        env = "DEPLOYD_ADDR",
        default_value = "127.0.0.1:8181"
    )]
    addr: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground.
    Daemon(DaemonArgs),

    /// Install or re-install a service from a zip archive.
    Install(InstallArgs),

    /// Replace one file inside a managed service.
    Update(UpdateArgs),

    /// Stop, disable and unregister a service. Files and backups stay.
    Remove(IdArgs),

    /// Re-install a service from a backup snapshot.
    Rollback(RollbackArgs),

    /// Start a managed service.
    Start(IdArgs),

    /// Stop a managed service.
    Stop(IdArgs),

    /// Enable a managed service at boot.
    Enable(IdArgs),

    /// Disable a managed service at boot.
    Disable(IdArgs),

    /// Print supervisor status text for a service.
    Status(IdArgs),

    /// Print whether a service is running.
    IsRunning(IdArgs),

    /// Print whether a service is enabled.
    IsEnabled(IdArgs),

    /// List managed services.
    List(ListingArgs),

    /// List files inside a service with their delete tokens.
    Files(IdListingArgs),

    /// List backup snapshots of a service, newest first.
    Backups(IdListingArgs),

    /// Delete one file from a service by token.
    DeleteFile(DeleteFileArgs),

    /// Ask the supervisor to re-read unit definitions.
    Reload,

    /// Reload the daemon's registry from its record store.
    Resync,

    /// Stop the daemon.
    Shutdown,
}

/// `<id>` plus the listing flags.
#[derive(clap::Args, Debug)]
struct IdListingArgs {
    #[command(flatten)]
    id: IdArgs,

    #[command(flatten)]
    listing: ListingArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let addr = cli.addr;
    match cli.command {
        Commands::Daemon(args) => args.run(),
        Commands::Install(args) => args.run(addr),
        Commands::Update(args) => args.run(addr),
        Commands::Remove(args) => commands::service::run(addr, ServiceCommand::Remove, args),
        Commands::Rollback(args) => args.run(addr),
        Commands::Start(args) => commands::service::run(addr, ServiceCommand::Start, args),
        Commands::Stop(args) => commands::service::run(addr, ServiceCommand::Stop, args),
        Commands::Enable(args) => commands::service::run(addr, ServiceCommand::Enable, args),
        Commands::Disable(args) => commands::service::run(addr, ServiceCommand::Disable, args),
        Commands::Status(args) => commands::service::run(addr, ServiceCommand::Status, args),
        Commands::IsRunning(args) => commands::service::run(addr, ServiceCommand::IsRunning, args),
        Commands::IsEnabled(args) => commands::service::run(addr, ServiceCommand::IsEnabled, args),
        Commands::List(args) => commands::files::list_services(addr, args),
        Commands::Files(args) => commands::files::list_files(addr, args.id, args.listing),
        Commands::Backups(args) => commands::files::list_backups(addr, args.id, args.listing),
        Commands::DeleteFile(args) => args.run(addr),
        Commands::Reload => commands::admin::reload(addr),
        Commands::Resync => commands::admin::resync(addr),
        Commands::Shutdown => commands::admin::shutdown(addr),
    }
}
