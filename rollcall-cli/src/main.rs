//! Rollcall — Discord roster → Google Sheets sync.
//!
//! # Usage
//!
//! ```text
//! rollcall start
//! rollcall sync [--dry-run] [--json]
//! rollcall status [--host <host>] [--port <port>]
//! ```
//!
//! Configuration comes from the environment; a `.env` file in the working
//! directory is loaded first.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{status::StatusArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "rollcall",
    version,
    about = "Mirror Discord team roles into the league spreadsheet",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground (gateway + timer + liveness HTTP).
    Start,

    /// Run one reconciliation pass now, without connecting to the gateway.
    Sync(SyncArgs),

    /// Query a running daemon's /status endpoint.
    Status(StatusArgs),
}

fn main() -> Result<()> {
    // A missing .env is normal; the environment may already be complete.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start => commands::start::run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
