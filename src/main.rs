//! Fear & Greed alert bot
//!
//! Daily Crypto Fear & Greed Index ingestion, alerting and history.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use fng_alert::{
    backfill::{self, HISTORY_START},
    commentary::CommentaryClient,
    config::Config,
    engine::{AlertEngine, CycleFailure, CycleOutcome, Sentiment},
    error::AlertError,
    job::AlertJob,
    notify::Notifier,
    source::{FngClient, PriceClient},
    storage::{summarize, HistoryPeriod, RecordStore, SqliteStore, SupabaseStore},
};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fng-alert")]
#[command(about = "Crypto Fear & Greed Index alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to config.toml, config.yaml, ~/.config/fng-alert/config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine over a JSON batch and print the outcome
    Transform {
        /// Input file; reads stdin when omitted
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Run one cycle now
    Run {
        /// Print the outcome without persisting or notifying
        #[arg(long)]
        dry_run: bool,
    },
    /// Run every day at the scheduled time
    Daemon,
    /// Backfill stored history from the index API
    Seed {
        /// First day to store (YYYY-MM-DD)
        #[arg(long, default_value = HISTORY_START)]
        since: NaiveDate,
    },
    /// Show current reading, change and range over a period
    Stats {
        /// 7d, 30d, 2m, 3m, 1y or 2y
        #[arg(short, long, default_value = "1y")]
        period: HistoryPeriod,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Transform { input } => transform(config, input.as_deref()),
        Commands::Run { dry_run } => run_once(config, dry_run).await,
        Commands::Daemon => run_daemon(config).await,
        Commands::Seed { since } => seed(config, since).await,
        Commands::Stats { period } => show_stats(config, period).await,
    }
}

fn transform(config: Config, input: Option<&str>) -> anyhow::Result<()> {
    let engine = AlertEngine::new(config.engine)?;

    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let now = Utc::now();
    let outcome = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => engine.run(&value, now),
        Err(e) => {
            let reason = AlertError::InvalidInput(e.to_string()).to_string();
            tracing::error!("Transform failed: {}", reason);
            CycleOutcome::Failed(CycleFailure::new(reason, now))
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_once(config: Config, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        tracing::warn!("Running in DRY RUN mode - nothing will be stored or sent");
    }

    let job = build_job(&config, !dry_run).await?;
    let run = job.run_once(Utc::now()).await;

    println!("{}", serde_json::to_string_pretty(&run.outcome)?);
    if dry_run && run.outcome.should_alert() {
        println!("\n{}", run.outcome.message());
    }

    tracing::info!(
        persisted = run.persisted,
        delivered = run.delivered,
        "Cycle finished"
    );
    Ok(())
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting daily alerts at {:02}:{:02} {}",
        config.schedule.hour,
        config.schedule.minute,
        config.engine.timezone
    );

    let job = build_job(&config, true).await?;

    tokio::select! {
        result = job.run_daily(&config.schedule) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    Ok(())
}

async fn seed(config: Config, since: NaiveDate) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(config.source.timeout_secs);
    let index = FngClient::new(&config.source.fng_url, timeout)?;
    let store = primary_store(&config).await?;

    let summary = backfill::seed(
        &index,
        store.as_ref(),
        backfill::day_start(since),
        &config.engine,
    )
    .await?;

    println!("\n🌱 Backfill into {}\n", store.name());
    println!("Fetched:         {}", summary.fetched);
    println!("Since {}:  {}", since, summary.eligible);
    println!("Written:         {}", summary.written);
    println!("Failed batches:  {}", summary.failed_batches);
    Ok(())
}

async fn show_stats(config: Config, period: HistoryPeriod) -> anyhow::Result<()> {
    let store = primary_store(&config).await?;
    let history = store.history_since(period.since(Utc::now())).await?;
    let stats = summarize(&history)?;

    let band = stats.band;
    println!("\n📊 Fear & Greed Index ({})\n", period);
    println!(
        "{:<12} {:>4}  {} {}",
        "Current",
        stats.current.value,
        band.icon(),
        band.label()
    );
    println!("{:<12} {:>4}", "Yesterday", stats.yesterday.value);
    println!("{:<12} {:>+4}", "Change", stats.change);
    println!("{}", "-".repeat(40));
    for (label, record) in [("High", &stats.high), ("Low", &stats.low)] {
        println!(
            "{:<12} {:>4}  {} ({})",
            label,
            record.value,
            Sentiment::from_value(record.value).icon(),
            record.timestamp_iso.get(..10).unwrap_or(&record.timestamp_iso)
        );
    }
    Ok(())
}

/// Wire sources, stores and sinks from configuration
async fn build_job(config: &Config, with_sinks: bool) -> anyhow::Result<AlertJob> {
    let timeout = Duration::from_secs(config.source.timeout_secs);
    let engine = AlertEngine::new(config.engine.clone())?;
    let index = FngClient::new(&config.source.fng_url, timeout)?;

    let mut job = AlertJob::new(engine, Arc::new(index));

    if config.source.fetch_prices {
        job = job.with_prices(Arc::new(PriceClient::new(&config.source.price_url, timeout)?));
    }

    if let Some(llm) = &config.llm {
        let client = CommentaryClient::from_config(llm, timeout)?;
        tracing::info!("AI commentary via {}", client.provider_name());
        job = job.with_commentary(Arc::new(client));
    }

    if !with_sinks {
        return Ok(job);
    }

    for store in configured_stores(config).await? {
        job = job.with_store(store);
    }

    match &config.telegram {
        Some(telegram) => {
            job = job
                .with_sink(Arc::new(Notifier::from_config(telegram, timeout)?))
                .notify_failures(telegram.notify_failures);
        }
        None => tracing::warn!("Telegram not configured, alerts will only be logged"),
    }

    Ok(job)
}

async fn configured_stores(config: &Config) -> anyhow::Result<Vec<Arc<dyn RecordStore>>> {
    let timeout = Duration::from_secs(config.source.timeout_secs);
    let mut stores: Vec<Arc<dyn RecordStore>> = Vec::new();

    if let Some(supabase) = &config.supabase {
        stores.push(Arc::new(SupabaseStore::new(supabase, timeout)?));
    }
    if let Some(database) = &config.database {
        let path = shellexpand::tilde(&database.path);
        stores.push(Arc::new(SqliteStore::connect(&*path).await?));
    }

    if stores.is_empty() {
        tracing::warn!("No record store configured, readings will not be persisted");
    }
    Ok(stores)
}

/// First configured store; Supabase wins over SQLite
async fn primary_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    configured_stores(config)
        .await?
        .into_iter()
        .next()
        .context("no record store configured: set [supabase] or [database]")
}
