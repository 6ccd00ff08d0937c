//! Forge-Census main entry point
//!
//! This is the command-line interface for the Forge-Census repository crawler.

use anyhow::{Context, Result};
use clap::Parser;
use forge_census::config::{load_config_with_hash, Config};
use forge_census::crawler::{run_census, JobSpec};
use forge_census::output::{export_repositories, load_statistics, print_statistics, ExportFormat};
use forge_census::partition::PartitionPlan;
use forge_census::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Forge-Census: partitioned repository discovery
///
/// Each invocation is one matrix job. It crawls the slice of the public
/// repository search space owned by `--matrix-index` out of `--matrix-total`
/// jobs and upserts up to `--repos` unique repositories into SQLite.
#[derive(Parser, Debug)]
#[command(name = "forge-census")]
#[command(version)]
#[command(about = "Partitioned repository discovery for code-forge search APIs", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// 0-based index of this matrix job
    #[arg(long, default_value_t = 0)]
    matrix_index: u64,

    /// Number of matrix jobs sharing the search space
    #[arg(long, default_value_t = 1)]
    matrix_total: u64,

    /// Repositories to collect, overriding `target-repos`
    #[arg(long)]
    repos: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the queries this job would run without contacting the API
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export stored repositories (csv, json or jsonl) and exit
    #[arg(long, value_name = "FMT", requires = "out")]
    export: Option<ExportFormat>,

    /// Destination file for --export
    #[arg(long, value_name = "PATH", requires = "export")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let job = JobSpec {
        index: cli.matrix_index,
        total: cli.matrix_total,
        target: cli.repos.unwrap_or(config.crawler.target_repos),
    };

    if cli.dry_run {
        handle_dry_run(&config, job)
    } else if cli.stats {
        handle_stats(&config)
    } else if let (Some(format), Some(out)) = (cli.export, cli.out.as_deref()) {
        handle_export(&config, format, out)
    } else {
        handle_crawl(&config, &config_hash, job).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forge_census=info,warn"),
            1 => EnvFilter::new("forge_census=debug,info"),
            2 => EnvFilter::new("forge_census=trace,debug"),
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

/// Handles the --dry-run mode: validates config and lists the job's queries
fn handle_dry_run(config: &Config, job: JobSpec) -> Result<()> {
    let plan = PartitionPlan::resolve(config.partition.as_ref())
        .context("Invalid partition configuration")?;
    let queries = plan
        .generate(job.index, job.total)
        .with_context(|| format!("Cannot partition job {} of {}", job.index, job.total))?;

    println!("=== Forge-Census Dry Run ===\n");

    println!("Job:");
    println!("  Matrix index: {} of {}", job.index, job.total);
    println!("  Target repositories: {}", job.target);
    println!(
        "  Active dimensions: {}",
        plan.active_dimensions(job.total)
            .iter()
            .map(|d| format!("{} ({})", d.name(), d.cardinality()))
            .collect::<Vec<_>>()
            .join(" x ")
    );

    println!("\nCrawler:");
    println!("  Workers per query: {}", config.crawler.workers_per_query);
    println!("  Max concurrent requests: {}", config.crawler.max_concurrent_requests);
    println!("  Max pages per query: {}", config.crawler.max_pages_per_query);
    println!("  Page size: {}", config.crawler.page_size);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nQueries ({}):", queries.len());
    for query in &queries {
        println!("  - {}", query);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes stored repositories to a file
fn handle_export(config: &Config, format: ExportFormat, out: &Path) -> Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let count = export_repositories(&storage, format, out)
        .with_context(|| format!("Failed to export to {}", out.display()))?;

    println!("✓ Exported {} repositories to: {}", count, out.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str, job: JobSpec) -> Result<()> {
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current pages");
            signal.cancel();
        }
    });

    tracing::info!(
        "Starting job {} of {} with target {}",
        job.index,
        job.total,
        job.target
    );

    let outcome = run_census(config, config_hash, job, shutdown)
        .await
        .context("Census job failed")?;

    tracing::info!(
        "Run {} completed: {} repositories stored",
        outcome.run_id,
        outcome.result.repositories.len()
    );

    Ok(())
}
