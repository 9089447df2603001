//! ---
//! fleet_section: "05-networking-external-interfaces"
//! fleet_subsection: "binary"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Control CLI for administrators managing robot lifecycles."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use robofleet_common::AppConfig;
use robofleet_core::LifecycleError;

mod robots;
mod wiring;

#[derive(Debug, Parser)]
#[command(author, version, about = "robofleet administrative control utility", long_about = None)]
struct Cli {
    /// Configuration file; `ROBOFLEET_CONFIG` takes precedence when set.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Robot lifecycle actions")]
    Robots(robots::RobotsCommand),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config)?;
    robofleet_common::init_tracing("robofleetctl", &config.logging)?;
    match cli.command {
        Commands::Robots(cmd) => robots::run(cmd, &config),
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<AppConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path);
    }
    candidates.push(PathBuf::from("configs/robofleet.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));
    AppConfig::load(&candidates)
}

/// NotFound exits with 2 so scripts can tell "already gone" from a real failure.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LifecycleError>() {
        Some(lifecycle) if lifecycle.is_not_found() => 2,
        _ => 1,
    }
}
