//! Manual-Scout main entry point
//!
//! This is the command-line interface for the manual crawler and its job queue.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use manual_scout::config::{load_config_with_hash, load_job_spec, Config};
use manual_scout::output::{print_crawl_summary, print_jobs, print_statistics};
use manual_scout::queue::{Clock, StoreLiveness, SystemClock};
use manual_scout::storage::{open_storage, shared, SharedStorage};
use manual_scout::{JobQueue, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Manual-Scout: a PDF manual discovery crawler
///
/// Manual-Scout crawls equipment-manual sites for PDF files, filters them
/// by extension, terms, site and size, and records what it finds. Crawls
/// run as jobs from a persisted queue, one at a time.
#[derive(Parser, Debug)]
#[command(name = "manual-scout")]
#[command(version)]
#[command(about = "A PDF manual discovery crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "scout.toml", global = true)]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a job definition to the queue
    Submit {
        /// Path to the job TOML file
        job: PathBuf,
    },

    /// Crawl a job definition immediately, outside the queue
    Crawl {
        /// Path to the job TOML file
        job: PathBuf,
    },

    /// Run a queued job (the head of the queue if no id is given)
    Run {
        /// Job to run
        id: Option<i64>,
    },

    /// List jobs
    List {
        /// Only show jobs with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show queue and discovery statistics
    Stats,

    /// Stop a running job and put it back in the queue
    Stop { id: i64 },

    /// Copy a job to the tail of the queue
    Clone { id: i64 },

    /// Replace the definition of a job that is not running
    Update {
        id: i64,
        /// Path to the job TOML file
        job: PathBuf,
    },

    /// Delete a job that is not running
    Delete { id: i64 },

    /// Move a queued job to a 1-based position
    Move { id: i64, position: i64 },

    /// Fail running jobs that have no live worker or ran too long
    Sweep,

    /// Queue scheduled jobs whose time has come
    Release,

    /// Flip the autostart flag of the head of the queue
    ToggleAutostart,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let storage = open_shared_storage(&config)?;

    // Leases live in the database so every invocation sees the same workers
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(StoreLiveness::new(storage.clone(), clock.clone(), &config.queue));
    let queue = JobQueue::new(&config, storage, registry, clock)
        .context("failed to set up job queue")?;

    match cli.command {
        Command::Submit { job } => handle_submit(&queue, &job)?,
        Command::Crawl { job } => handle_crawl(&config, &job, queue.storage().clone()).await?,
        Command::Run { id } => handle_run(&queue, id).await?,
        Command::List { status } => handle_list(&queue, status.as_deref())?,
        Command::Stats => print_statistics(&queue.stats()?),
        Command::Stop { id } => {
            let position = queue.stop(id)?;
            println!("✓ Job {} stopped and requeued at position {}", id, position);
        }
        Command::Clone { id } => {
            let copy = queue.clone_job(id)?;
            println!("✓ Job {} cloned as job {} ('{}')", id, copy.id, copy.spec.name);
        }
        Command::Update { id, job } => handle_update(&queue, id, &job)?,
        Command::Delete { id } => {
            queue.delete(id)?;
            println!("✓ Job {} deleted", id);
        }
        Command::Move { id, position } => {
            queue.move_to(id, position)?;
            println!("✓ Job {} moved to position {}", id, position);
        }
        Command::Sweep => {
            let swept = queue.sweep_stale()?;
            println!("✓ Reclaimed {} stale job(s)", swept.len());
        }
        Command::Release => {
            let released = queue.release_due()?;
            println!("✓ Released {} scheduled job(s)", released.len());
        }
        Command::ToggleAutostart => match queue.toggle_autostart()? {
            Some(enabled) => println!("✓ Autostart {}", if enabled { "on" } else { "off" }),
            None => println!("Queue is empty"),
        },
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("manual_scout=info,warn"),
            1 => EnvFilter::new("manual_scout=debug,info"),
            2 => EnvFilter::new("manual_scout=trace,debug"),
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

fn open_shared_storage(config: &Config) -> Result<SharedStorage> {
    let path = Path::new(&config.output.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(shared(storage))
}

/// Handles `submit`: parses the job file and enqueues it
fn handle_submit(queue: &JobQueue, job: &Path) -> Result<()> {
    let spec = load_job_spec(job)
        .with_context(|| format!("failed to load job definition {}", job.display()))?;
    let record = queue.submit(spec)?;

    match record.queue_position {
        Some(position) => println!(
            "✓ Job {} ('{}') queued at position {}",
            record.id, record.spec.name, position
        ),
        None => println!(
            "✓ Job {} ('{}') is {}",
            record.id, record.spec.name, record.status
        ),
    }
    Ok(())
}

/// Handles `update`: replaces a job's definition from a job file
fn handle_update(queue: &JobQueue, id: i64, job: &Path) -> Result<()> {
    let spec = load_job_spec(job)
        .with_context(|| format!("failed to load job definition {}", job.display()))?;
    let record = queue.update(id, spec)?;
    println!("✓ Job {} ('{}') is {}", record.id, record.spec.name, record.status);
    Ok(())
}

/// Handles `run`: promotes a job and waits for it (and any autostarted
/// successors) to finish
async fn handle_run(queue: &JobQueue, id: Option<i64>) -> Result<()> {
    queue.release_due()?;

    let handle = match id {
        Some(id) => queue.start(id)?,
        None => match queue.start_next()? {
            Some(handle) => handle,
            None => {
                println!("No queued jobs");
                return Ok(());
            }
        },
    };

    handle.await.context("job worker panicked")?;

    let jobs = queue.list(None)?;
    print_jobs(&jobs);
    Ok(())
}

fn handle_list(queue: &JobQueue, status: Option<&str>) -> Result<()> {
    let status = match status {
        Some(s) => match JobStatus::from_db_string(s) {
            Some(status) => Some(status),
            None => bail!("unknown job status '{}'", s),
        },
        None => None,
    };

    print_jobs(&queue.list(status)?);
    Ok(())
}

/// Handles `crawl`: runs one job definition directly and prints a summary
async fn handle_crawl(config: &Config, job: &Path, storage: SharedStorage) -> Result<()> {
    let spec = load_job_spec(job)
        .with_context(|| format!("failed to load job definition {}", job.display()))?;

    tracing::info!("Starting one-off crawl '{}'", spec.name);
    let summary = manual_scout::crawler::crawl(config, &spec, storage)
        .await
        .context("crawl failed")?;

    print_crawl_summary(&summary);
    Ok(())
}
