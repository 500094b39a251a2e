//! Price Monitor
//!
//! Scrapes retailer product pages, keeps a price history and alerts on
//! significant price and stock changes.

mod config;
mod pipeline;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::{config_path, database_path, AppConfig, ConfigError};
use futures_util::StreamExt;
use pipeline::{dry_run, Pipeline};
use pricewatch_alerts::{ChannelConfig, Dispatcher};
use pricewatch_core::ProductId;
use pricewatch_engine::{AlertThreshold, ThresholdError};
use pricewatch_feeds::{Credentials, FeedError, ScraperClient};
use pricewatch_store::{PriceStore, StorageError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Price Monitor CLI
#[derive(Parser, Debug)]
#[command(name = "price-monitor")]
#[command(about = "Competitive price monitoring pipeline", long_about = None)]
struct Args {
    /// Configuration file path (defaults to $CONFIG_PATH, then config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file (defaults to $DB_DIR/prices.db, then data/prices.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Minimum price change in percent that raises an alert
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Scrape and print results without storing or alerting
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Skip scraping, only detect changes in stored history
    #[arg(long, default_value_t = false, conflicts_with = "dry_run")]
    detect_only: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitoring pipeline (default)
    Run,
    /// Export one product's price history as JSON lines
    History {
        retailer: String,
        url: String,
        /// Only observations at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Print store statistics
    Stats,
    /// Newest price of every product as JSON lines
    Latest {
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("Invalid product: {0}")]
    Product(#[from] pricewatch_core::ValidationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No target produced any observation")]
    NothingScraped,
}

impl AppError {
    fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Config(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries JSON output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Price monitor failed");
            e.exit_code()
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let db_path = database_path(args.database.clone());

    match args.command {
        None | Some(Command::Run) => run_pipeline(&args, db_path).await,
        Some(Command::History {
            ref retailer,
            ref url,
            since,
        }) => {
            let product = ProductId::new(retailer, url)?;
            let store = PriceStore::open(&db_path).await?;
            let result = export_history(&store, &product, since).await;
            store.close().await;
            result
        }
        Some(Command::Stats) => {
            let store = PriceStore::open(&db_path).await?;
            let result = store.stats().await;
            store.close().await;
            println!("{}", serde_json::to_string_pretty(&result?)?);
            Ok(())
        }
        Some(Command::Latest { ref category }) => {
            let store = PriceStore::open(&db_path).await?;
            let result = store.latest_by_retailer(category.as_deref()).await;
            store.close().await;
            for observation in result? {
                println!("{}", serde_json::to_string(&observation)?);
            }
            Ok(())
        }
    }
}

async fn export_history(
    store: &PriceStore,
    product: &ProductId,
    since: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    let mut history = Box::pin(store.history(product, since));
    let mut count = 0usize;
    while let Some(observation) = history.next().await {
        println!("{}", serde_json::to_string(&observation?)?);
        count += 1;
    }
    info!(product = %product, count, "Exported history");
    Ok(())
}

/// The threshold flag overrides the config file; both are validated before
/// anything is fetched.
fn resolve_threshold(flag: Option<f64>, config: &AppConfig) -> Result<AlertThreshold, ThresholdError> {
    match flag {
        Some(pct) => AlertThreshold::new(pct),
        None => config.threshold(),
    }
}

async fn run_pipeline(args: &Args, db_path: PathBuf) -> Result<(), AppError> {
    let config = AppConfig::load(&config_path(args.config.clone()))?;
    let threshold = resolve_threshold(args.threshold, &config).map_err(ConfigError::from)?;

    let client = ScraperClient::new(Credentials::from_env(), config.scraping.clone())?;

    if args.dry_run {
        info!("Dry run: results are printed, nothing is stored");
        let observations = dry_run(&client, &config.retailers).await;
        println!("{}", serde_json::to_string_pretty(&observations)?);
        return Ok(());
    }

    let store = PriceStore::open(&db_path).await?;
    let dispatcher = Dispatcher::from_config(ChannelConfig::from_env());
    info!(
        database = %db_path.display(),
        channels = ?dispatcher.channel_names(),
        threshold_pct = threshold.pct(),
        "Starting run"
    );
    let pipeline = Pipeline::new(&store, &dispatcher, threshold);

    let result = if args.detect_only {
        pipeline.detect_only().await
    } else {
        Ok(pipeline.run(&client, &config.retailers).await)
    };
    store.close().await;

    let summary = result?;
    summary.log();
    if summary.failed() > 0 {
        warn!(failed = summary.failed(), "Some products failed");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !args.detect_only && summary.nothing_scraped(config.retailers.len()) {
        return Err(AppError::NothingScraped);
    }
    Ok(())
}
