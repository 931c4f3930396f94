//! Rentdesk CLI - back office for the rental fleet from the terminal
//!
//! Triage consultations and reservations, manage vehicle images and follow
//! an inbox live.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::consultations::run_consultations;
use crate::commands::fleet::{run_models, run_vehicles};
use crate::commands::reservations::run_reservations;
use crate::commands::unread::run_unread;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "rentdesk=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Consultations { command } => run_consultations(command, profile).await?,
        Commands::Reservations { command } => run_reservations(command, profile).await?,
        Commands::Vehicles { command } => run_vehicles(command, profile).await?,
        Commands::Models { command } => run_models(command, profile).await?,
        Commands::Unread { json } => run_unread(json, profile).await?,
        Commands::Watch {
            inbox,
            range,
            guard_secs,
            poll_secs,
            json,
        } => run_watch(inbox, &range, guard_secs, poll_secs, json, profile).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Auth { command } => run_auth(command, profile).await?,
    }

    Ok(())
}
