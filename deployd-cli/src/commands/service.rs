//! Single-ID commands: lifecycle, queries and removal.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use deployd_daemon::Request;

use super::client::call;

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Managed service ID.
    pub id: String,
}

#[derive(Debug, Clone, Copy)]
pub enum ServiceCommand {
    Remove,
    Start,
    Stop,
    Enable,
    Disable,
    Status,
    IsRunning,
    IsEnabled,
}

pub fn run(addr: SocketAddr, command: ServiceCommand, args: IdArgs) -> Result<()> {
    let id = args.id;
    let request = match command {
        ServiceCommand::Remove => Request::Remove { id: id.clone() },
        ServiceCommand::Start => Request::Start { id: id.clone() },
        ServiceCommand::Stop => Request::Stop { id: id.clone() },
        ServiceCommand::Enable => Request::Enable { id: id.clone() },
        ServiceCommand::Disable => Request::Disable { id: id.clone() },
        ServiceCommand::Status => Request::Status { id: id.clone() },
        ServiceCommand::IsRunning => Request::IsRunning { id: id.clone() },
        ServiceCommand::IsEnabled => Request::IsEnabled { id: id.clone() },
    };
    let data = call(addr, request)?;

    match command {
        ServiceCommand::Status => print!("{}", data.as_str().unwrap_or_default()),
        ServiceCommand::IsRunning | ServiceCommand::IsEnabled => {
            println!("{}", data.as_bool().unwrap_or(false));
        }
        ServiceCommand::Remove => println!(
            "{} removed {} (files and backups kept)",
            "■".green().bold(),
            id.bold()
        ),
        ServiceCommand::Start => println!("{} started {}", "■".green().bold(), id.bold()),
        ServiceCommand::Stop => println!("{} stopped {}", "■".green().bold(), id.bold()),
        ServiceCommand::Enable => println!("{} enabled {}", "■".green().bold(), id.bold()),
        ServiceCommand::Disable => println!("{} disabled {}", "■".green().bold(), id.bold()),
    }
    Ok(())
}
