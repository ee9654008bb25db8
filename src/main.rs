//! Feed-Harvest main entry point
//!
//! This is the command-line interface for the Feed-Harvest media harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use feed_harvest::config::{load_config_with_hash, Config};
use feed_harvest::crawler::{crawl, CliExtractor, Pipeline};
use feed_harvest::jobs::JobScheduler;
use feed_harvest::output::{print_statistics, print_status_records};
use feed_harvest::storage::open_job_store;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Feed-Harvest: a paginated feed media harvester
///
/// Feed-Harvest walks a content feed page by page, downloads the images,
/// gifs and videos its posts reference, and tracks each job through a
/// status record.
#[derive(Parser, Debug)]
#[command(name = "feed-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A paginated feed media harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate config and show what would run without running anything
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the job queue and run jobs until interrupted (default)
    Serve,

    /// Run a single job directly, bypassing the queue
    Crawl {
        /// Feed-source identifier, e.g. r/pics
        target: String,

        /// Job identifier used for output paths
        job_id: String,
    },

    /// Show job status records
    Status {
        /// Only show this job
        job_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Arc::new(config);
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => handle_serve(config).await,
        Command::Crawl { target, job_id } => handle_crawl(config, &target, &job_id).await,
        Command::Status { job_id } => handle_status(&config, job_id.as_deref()),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("feed_harvest=info,warn"),
            1 => EnvFilter::new("feed_harvest=debug,info"),
            2 => EnvFilter::new("feed_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels the returned token on Ctrl-C
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping at the next page boundary");
            trigger.cancel();
        }
    });
    token
}

/// Handles --dry-run: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Feed-Harvest Dry Run ===\n");

    println!("Feed:");
    println!("  Endpoint: {}", config.feed.endpoint);
    println!("  Page size: {}", config.feed.page_size);
    println!("  Page delay: {}ms", config.feed.page_delay_ms);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nDownloads:");
    println!("  Minimum file size: {} bytes", config.download.min_file_size);
    println!("  Video hosts: {}", config.download.video_hosts.join(", "));

    println!("\nExtractor:");
    match CliExtractor::locate(&config.extractor.program) {
        Some(path) => println!("  Program: {}", path.display()),
        None => println!("  Program: {} (NOT FOUND)", config.extractor.program),
    }
    println!("  Verify output: {}", config.extractor.verify_output);

    println!("\nStop conditions:");
    println!("  Empty page limit: {}", config.stop.empty_page_limit);
    match config.stop.idle_timeout_secs {
        Some(secs) => println!("  Idle timeout: {}s", secs),
        None => println!("  Idle timeout: off"),
    }

    println!("\nJobs:");
    println!("  Queue: {}", config.jobs.queue_dir.display());
    println!("  Status: {}", config.jobs.status_dir.display());
    println!("  Media: {}", config.jobs.media_dir.display());
    println!("  Max concurrent jobs: {}", config.jobs.max_concurrent_jobs);

    println!("\n✓ Configuration is valid");
}

/// Handles the default mode: run the scheduler until interrupted
async fn handle_serve(config: Arc<Config>) -> anyhow::Result<ExitCode> {
    let store = open_job_store(&config.jobs).context("Failed to open job store")?;
    let extractor = Arc::new(CliExtractor::from_config(&config.extractor));
    let pipeline = Arc::new(Pipeline::new(config.clone(), extractor)?);

    let scheduler = JobScheduler::new(store, pipeline, &config.jobs, shutdown_token());
    scheduler.run().await?;

    Ok(ExitCode::SUCCESS)
}

/// Handles `crawl`: one job, exit status reflects the verdict
async fn handle_crawl(config: Arc<Config>, target: &str, job_id: &str) -> anyhow::Result<ExitCode> {
    let report = crawl(config, target, job_id, shutdown_token()).await?;

    println!("=== Job {} ===\n", job_id);
    print_statistics(&report.stats);
    if let Some(reason) = &report.stop_reason {
        println!("  Stopped: {}", reason);
    }

    if report.success {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("{}", feed_harvest::HarvestError::ZeroYield);
        Ok(ExitCode::FAILURE)
    }
}

/// Handles `status`: prints status records from the store
fn handle_status(config: &Config, job_id: Option<&str>) -> anyhow::Result<ExitCode> {
    let store = open_job_store(&config.jobs).context("Failed to open job store")?;

    let records = match job_id {
        Some(id) => store.get_status(id)?.into_iter().collect(),
        None => store.list_statuses()?,
    };
    print_status_records(&records);

    Ok(ExitCode::SUCCESS)
}
