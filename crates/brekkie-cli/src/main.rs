//! Brekkie CLI - plan breakfasts from the terminal.
//!
//! Works offline against a local database; sign in to keep the plan,
//! favorites and recipes in Supabase.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{resolve_db_path, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::favorites::run_favorites;
use crate::commands::migrate::run_migrate;
use crate::commands::plan::run_plan;
use crate::commands::profile::run_profile;
use crate::commands::recipes::run_recipes;
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

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("brekkie=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let command = match cli.command {
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
            return Ok(());
        }
        Some(Commands::Completions { shell, output }) => {
            return run_completions(shell, output.as_deref());
        }
        Some(Commands::Config { command }) => return run_config(command, profile),
        Some(command) => command,
    };

    let db_path = resolve_db_path(cli.db_path);
    let ctx = AppContext::open(&db_path, profile).await?;
    let result = match command {
        Commands::Plan { command } => run_plan(command, &ctx).await,
        Commands::Favorites { command } => run_favorites(command, &ctx).await,
        Commands::Recipes { command } => run_recipes(command, &ctx).await,
        Commands::Profile { command } => run_profile(command, &ctx).await,
        Commands::Auth { command } => run_auth(command, &ctx).await,
        Commands::Migrate => run_migrate(&ctx).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    };
    ctx.flush_notices();
    result
}
