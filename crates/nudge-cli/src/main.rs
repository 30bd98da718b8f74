//! Nudge CLI - reminders from the terminal, synced when you want them to be.

mod auth;
mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::done::run_done;
use crate::commands::edit::{run_edit, EditRequest};
use crate::commands::list::run_list;
use crate::commands::mode::run_mode;
use crate::commands::sync::run_sync;
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

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "nudge=info".parse::<tracing_subscriber::filter::Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Auth { command }) => run_auth(command).await?,
        Some(Commands::Add { title, at, fields }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_add(&title, &at, fields, &db_path).await?;
        }
        Some(Commands::List { all, json }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_list(all, json, &db_path).await?;
        }
        Some(Commands::Done { id }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_done(&id, &db_path).await?;
        }
        Some(Commands::Edit {
            id,
            title,
            at,
            no_repeat,
            fields,
        }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            let request = EditRequest {
                title,
                at,
                no_repeat,
                fields,
            };
            run_edit(&id, request, &db_path).await?;
        }
        Some(Commands::Delete { id }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_delete(&id, &db_path).await?;
        }
        Some(Commands::Mode { mode }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_mode(mode, &db_path).await?;
        }
        Some(Commands::Sync { command }) => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_sync(command, &db_path).await?;
        }
        None => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_list(false, false, &db_path).await?;
        }
    }

    Ok(())
}
