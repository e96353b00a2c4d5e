//! Wayfare CLI - saved deals, trips and bookings from the terminal
//!
//! Records live in a local database first and are mirrored to the travel
//! backend when one is configured.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::book::run_book;
use crate::commands::clear::run_clear;
use crate::commands::common::{build_candidate, join_words, CliContext};
use crate::commands::config::run_config;
use crate::commands::deals::run_deals;
use crate::commands::list::run_list;
use crate::commands::remove::run_remove;
use crate::commands::save::run_save;
use crate::commands::search::run_search;
use crate::commands::subscribe::run_subscribe;
use crate::commands::trip::run_trip;
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

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wayfare=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let context = CliContext::resolve(cli.db_path, cli.config, cli.offline)?;

    match cli.command {
        Commands::Save {
            city,
            id,
            title,
            price,
            img,
            kind,
            collection,
        } => {
            let candidate = build_candidate(id, join_words(&city), title, price, img, kind)?;
            run_save(&context, collection, candidate).await?;
        }
        Commands::List {
            collection,
            sort,
            json,
        } => run_list(&context, collection, sort, json)?,
        Commands::Remove { id, collection } => run_remove(&context, collection, &id)?,
        Commands::Clear { collection } => run_clear(&context, collection)?,
        Commands::Watch { collection } => run_watch(&context, collection).await?,
        Commands::Deals { json } => run_deals(&context, json)?,
        Commands::Trip { command } => run_trip(&context, command)?,
        Commands::Search {
            from,
            tab,
            save,
            json,
        } => run_search(&context, &from, &tab, save.as_deref(), json).await?,
        Commands::Book {
            id,
            collection,
            details,
        } => run_book(&context, collection, &id, &details).await?,
        Commands::Subscribe {
            email,
            plan,
            method,
        } => run_subscribe(&context, &email, plan, method).await?,
        Commands::Config { command } => run_config(&context, command)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
