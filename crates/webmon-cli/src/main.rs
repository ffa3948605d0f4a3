use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use webmon_client::ReqwestFetcher;
use webmon_core::traits::{Extractor, Fetcher, NullNotifier, WatchStore};
use webmon_core::{SchedulerConfig, SchedulerService, TracingSchedulerReporter, XPathExtractor};
use webmon_db::{Database, DatabaseConfig, WatchRepository};

#[derive(Parser)]
#[command(name = "webmon", version, about = "Watch web pages and record extracted values")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watch scheduler until interrupted
    Run {
        /// Maximum number of checks running concurrently
        #[arg(long, env = "WEBMON_WORKERS", default_value_t = 8)]
        workers: usize,

        /// Seconds between scheduling cycles
        #[arg(long, env = "WEBMON_TICK_SECS", default_value_t = 5)]
        tick_secs: u64,

        /// Per-fetch timeout in seconds
        #[arg(long, env = "WEBMON_FETCH_TIMEOUT_SECS", default_value_t = 10)]
        fetch_timeout_secs: u64,
    },

    /// Fetch a URL and apply an XPath expression once, without persisting
    Check {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// XPath expression to apply
        #[arg(short, long)]
        xpath: String,

        /// Per-fetch timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Show recorded values for a watch
    History {
        /// Watch ID
        #[arg(short, long)]
        watch_id: Uuid,

        /// Number of most recent values to show (0 = all)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("webmon=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            workers,
            tick_secs,
            fetch_timeout_secs,
        } => {
            cmd_run(workers, tick_secs, fetch_timeout_secs).await?;
        }
        Commands::Check {
            url,
            xpath,
            timeout_secs,
        } => {
            cmd_check(&url, &xpath, timeout_secs).await?;
        }
        Commands::History { watch_id, limit } => {
            let repo = connect_db().await?;
            cmd_history(watch_id, limit, &repo).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<WatchRepository> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db.watch_repo())
}

async fn cmd_run(workers: usize, tick_secs: u64, fetch_timeout_secs: u64) -> Result<()> {
    let store = connect_db().await?;

    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(fetch_timeout_secs))
        .context("Failed to create HTTP client")?;

    let config = SchedulerConfig::default()
        .with_max_concurrent_checks(workers)
        .with_tick_interval(Duration::from_secs(tick_secs));

    let scheduler = SchedulerService::new(
        store,
        fetcher,
        XPathExtractor::new(),
        NullNotifier,
        config,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_cancel.cancel();
        }
    });

    scheduler
        .run(cancel, &TracingSchedulerReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

async fn cmd_check(url: &str, xpath: &str, timeout_secs: u64) -> Result<()> {
    // The operator controls this machine, so private addresses are fine.
    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(timeout_secs))
        .context("Failed to create HTTP client")?
        .allow_private_urls();

    tracing::info!("Fetching {}", url);
    let content = fetcher.fetch(url).await.map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!("Fetched {} bytes", content.len());

    let value = XPathExtractor::new()
        .extract(&content, xpath)
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{value}");

    Ok(())
}

async fn cmd_history(watch_id: Uuid, limit: usize, repo: &WatchRepository) -> Result<()> {
    let Some(watch) = repo.get_watch(watch_id).await.map_err(|e| anyhow::anyhow!(e))? else {
        println!("No watch with id {watch_id}");
        return Ok(());
    };

    let values = repo
        .list_values(watch_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if values.is_empty() {
        println!("No values recorded for '{}' ({})", watch.name, watch_id);
        return Ok(());
    }

    let skip = if limit > 0 && values.len() > limit {
        values.len() - limit
    } else {
        0
    };

    println!("Values for '{}' ({}):\n", watch.name, watch_id);
    for value in &values[skip..] {
        println!(
            "  {} — {:?}",
            value.created.format("%Y-%m-%d %H:%M:%S UTC"),
            value.content,
        );
    }
    println!(
        "\nShowing {} of {} values. Next check at {}",
        values.len() - skip,
        values.len(),
        watch.next_check.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    Ok(())
}
