//! wc-migrate: copies WooCommerce orders, customers and products into a
//! local document store.
//!
//! Each import pages through the shop's REST API (`wc/v3`) for a creation-date
//! window, normalizes date fields into structured timestamps, and upserts the
//! records by id. Pages are fetched concurrently with a fixed upper bound.

#![warn(clippy::all)]

mod cli;
mod config;
mod dates;
mod record;
mod schema;
mod shutdown;
mod store;
mod sync;
mod types;
mod woo;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Command, ImportArgs, StatusArgs};
use config::Config;
use schema::EntityKind;
use store::{CollectionCount, DocumentStore, SqliteDocumentStore, StoreStatus};
use sync::{FetchOneOutcome, ImportRequest, SyncEngine};
use woo::WooClient;

/// Run the status command.
async fn run_status(config: &Config, args: &StatusArgs) -> anyhow::Result<()> {
    let path = &config.store_path;
    if !path.exists() {
        println!("No document store found at {}", path.display());
        println!("Run an import first to create it.");
        return Ok(());
    }

    let store = SqliteDocumentStore::open(path).await?;

    let mut collections = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        let collection = config.sync.collections.for_kind(kind);
        collections.push(CollectionCount {
            kind,
            collection: collection.to_string(),
            documents: store.count(collection).await?,
        });
    }
    let status = StoreStatus {
        path: path.clone(),
        collections,
        runs: store.recent_sync_runs(args.runs).await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Document store: {}", status.path.display());
    println!();
    println!("Collections:");
    for entry in &status.collections {
        println!(
            "  {:<10} {:>8}  ({})",
            entry.kind.as_str(),
            entry.documents,
            entry.collection
        );
    }

    println!();
    if status.runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }
    println!("Recent sync runs:");
    for run in &status.runs {
        let kind = run.kind.map_or("?", |k| k.as_str());
        let started = run.started_at.format("%Y-%m-%d %H:%M:%S UTC");
        match run.completed_at {
            Some(_) => {
                let stats = &run.stats;
                println!(
                    "  #{} {} {}: {} written, {} skipped, {}/{} pages failed{}",
                    run.id,
                    started,
                    kind,
                    stats.written,
                    stats.skipped,
                    stats.pages_failed,
                    stats.pages_total,
                    if stats.interrupted { " (interrupted)" } else { "" }
                );
                for failure in &stats.failures {
                    println!("      {}", failure);
                }
            }
            None => println!("  #{} {} {}: did not complete", run.id, started, kind),
        }
    }
    Ok(())
}

/// Run one of the import commands: a single record with `--id`, otherwise a
/// paginated import over the resolved window.
async fn run_import(
    config: &Config,
    kind: EntityKind,
    args: &ImportArgs,
    fail_on_error: bool,
) -> anyhow::Result<()> {
    let api = config.require_api()?;
    let client = WooClient::new(
        &api.site,
        &api.consumer_key,
        &api.consumer_secret,
        config.request_timeout,
    )?;
    let store = SqliteDocumentStore::open(&config.store_path).await?;
    tracing::debug!("Document store at {}", store.path().display());

    let engine = SyncEngine::new(Arc::new(client), Arc::new(store), config.sync.clone());

    if let Some(id) = &args.id {
        let outcome = engine.fetch_one(kind, id).await?;
        if fail_on_error {
            match outcome {
                FetchOneOutcome::Written(_) => {}
                FetchOneOutcome::NotFound { status } => {
                    anyhow::bail!("{} {} not imported: HTTP {}", kind.singular(), id, status)
                }
                FetchOneOutcome::MissingId => {
                    anyhow::bail!("{} {} not imported: response carried no id", kind.singular(), id)
                }
            }
        }
        return Ok(());
    }

    let (from, to) = args.resolve_range(chrono::Local::now());
    let request = ImportRequest {
        kind,
        sort: args.sort_order(),
        from,
        to,
        sync: args.sync,
    };

    let shutdown_token = shutdown::install_signal_handler()?;
    let report = engine.import_all(&request, shutdown_token).await?;

    if fail_on_error && report.has_failures() {
        anyhow::bail!(
            "{} import finished with {} failed pages and {} failed records",
            kind,
            report.failures.len(),
            report.counts.failed
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    if let Some(path) = &dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let config = Config::from_cli(&cli)?;
    tracing::debug!(?config, "Configuration");

    match &cli.command {
        Command::Status(args) => run_status(&config, args).await,
        command => match command.import() {
            Some((kind, args)) => run_import(&config, kind, args, cli.fail_on_error).await,
            None => Ok(()),
        },
    }
}
