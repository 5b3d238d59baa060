//! Command-line entry points. Thin glue over the registry, pipeline and
//! scheduler; all real work happens in those modules.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::db::Database;
use crate::fetch::FetchPipeline;
use crate::models::{FetchOutcome, FetchResult, NewProduct};
use crate::scheduler::{PollScheduler, stop_channel};

#[derive(Parser)]
#[command(
    name = "el-price-watcher",
    version,
    about = "Track electronics prices (x-kom, morele.net, Amazon) in a local SQLite history"
)]
pub struct Cli {
    /// Path to the SQLite database file (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a product URL and record one immediate observation
    Add {
        url: String,
        /// Optional display name; defaults to the page title once fetched
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a tracked product and its history
    Remove { id: String },
    /// List tracked products with their latest outcome
    List,
    /// Show price history for one product
    History {
        id: String,
        /// Maximum number of most recent entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Fetch all tracked products once and store outcomes
    Once,
    /// Run periodic polling until interrupted
    Run {
        /// Polling interval in seconds (overrides configuration)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Export all outcomes to a CSV file
    Export { out: PathBuf },
    /// Delete all products and outcomes
    Clear {
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    if let Some(db_path) = cli.db {
        config.database.path = db_path;
    }
    if let Command::Run { interval: Some(interval) } = &cli.command {
        config.scheduler.interval_secs = *interval;
    }
    config.validate()?;

    let db = Database::connect(&config.database).await?;

    match cli.command {
        Command::Add { url, name } => add(&db, &config, url, name).await,
        Command::Remove { id } => {
            db.remove_product(&id).await?;
            println!("Removed product {id}");
            Ok(())
        }
        Command::List => list(&db).await,
        Command::History { id, limit } => history(&db, &id, limit).await,
        Command::Once => {
            let pipeline = Arc::new(FetchPipeline::new(config.fetcher)?);
            let scheduler = PollScheduler::new(db, pipeline, config.scheduler);
            let report = scheduler.run_once().await?;
            println!("Done. OK: {}/{}", report.succeeded, report.total);
            Ok(())
        }
        Command::Run { .. } => run_forever(db, config).await,
        Command::Export { out } => export(&db, &out).await,
        Command::Clear { yes } => clear(&db, &config, yes).await,
    }
}

async fn add(db: &Database, config: &AppConfig, url: String, name: Option<String>) -> Result<()> {
    url::Url::parse(&url)?;

    let product = db
        .add_product(NewProduct {
            url,
            name,
            store: None,
        })
        .await?;

    // Record a first observation right away so the product shows up with
    // data instead of an empty history.
    let pipeline = FetchPipeline::new(config.fetcher.clone())?;
    let result = pipeline.check(&product).await;
    if let Some(title) = &result.page_title {
        if product.name_is_placeholder() {
            db.rename_product(&product.id, title).await?;
        }
    }
    db.record(&result.outcome).await?;

    let shown = db.get_product(&product.id).await?.unwrap_or(product);
    println!(
        "Added product {} ({}) [{}]: {}",
        shown.id,
        shown.name,
        shown.store,
        format_outcome(&result.outcome)
    );
    Ok(())
}

async fn list(db: &Database) -> Result<()> {
    let products = db.list_products().await?;
    if products.is_empty() {
        println!("No tracked products.");
        return Ok(());
    }

    let latest = db.latest_all().await?;
    println!(
        "{:<32}  {:<8}  {:<24}  {}",
        "ID", "STORE", "LAST OUTCOME", "NAME"
    );
    for product in products {
        let outcome = latest
            .get(&product.id)
            .map(format_outcome)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32}  {:<8}  {:<24}  {}",
            product.id, product.store, outcome, product.name
        );
    }
    Ok(())
}

async fn history(db: &Database, id: &str, limit: usize) -> Result<()> {
    let product = db
        .get_product(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no such product: {id}"))?;

    let series = db.series_for(id).await?;
    println!("{} [{}]: {} entries", product.name, product.store, series.len());

    let skip = series.len().saturating_sub(limit);
    for outcome in series.into_iter().skip(skip) {
        println!(
            "{}  {}",
            outcome.ts.format("%Y-%m-%d %H:%M:%S"),
            format_outcome(&outcome)
        );
    }
    Ok(())
}

async fn run_forever(db: Database, config: AppConfig) -> Result<()> {
    let pipeline = Arc::new(FetchPipeline::new(config.fetcher)?);
    let interval = config.scheduler.interval_secs;
    let scheduler = PollScheduler::new(db, pipeline, config.scheduler);

    let (stop_tx, stop_rx) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = stop_tx.send(true);
        }
    });

    println!("Polling every {interval}s. Press Ctrl-C to stop.");
    scheduler.run(stop_rx).await?;
    Ok(())
}

async fn export(db: &Database, out: &PathBuf) -> Result<()> {
    let outcomes = db.all_outcomes().await?;

    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut csv = String::from("product_id,ts,price,currency,in_stock,failure_kind,detail\n");
    for outcome in &outcomes {
        csv.push_str(&csv_row(outcome));
        csv.push('\n');
    }
    std::fs::write(out, csv)?;

    println!("Wrote {} rows: {}", outcomes.len(), out.display());
    Ok(())
}

async fn clear(db: &Database, config: &AppConfig, yes: bool) -> Result<()> {
    if !yes {
        print!(
            "This will delete ALL products and outcomes in {}. Continue? [y/N] ",
            config.database.path
        );
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    db.clear_all().await?;
    println!("Database cleared.");
    Ok(())
}

fn format_outcome(outcome: &FetchOutcome) -> String {
    match &outcome.result {
        FetchResult::Price {
            amount,
            currency,
            availability,
        } => {
            let currency = currency.as_deref().unwrap_or("?");
            match availability {
                crate::models::Availability::OutOfStock => format!("{amount} {currency} (out of stock)"),
                _ => format!("{amount} {currency}"),
            }
        }
        FetchResult::Failure { kind, detail } => format!("error[{kind}]: {detail}"),
    }
}

fn csv_row(outcome: &FetchOutcome) -> String {
    let (price, currency, in_stock, kind, detail) = match &outcome.result {
        FetchResult::Price {
            amount,
            currency,
            availability,
        } => (
            amount.to_string(),
            currency.clone().unwrap_or_default(),
            availability
                .to_db()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            String::new(),
            String::new(),
        ),
        FetchResult::Failure { kind, detail } => (
            String::new(),
            String::new(),
            String::new(),
            kind.to_string(),
            detail.clone(),
        ),
    };

    format!(
        "{},{},{},{},{},{},{}",
        outcome.product_id,
        outcome.attempt_ts(),
        price,
        currency,
        in_stock,
        kind,
        csv_quote(&detail)
    )
}

fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
