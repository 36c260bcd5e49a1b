use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use playlist_sync::{
    config::Config,
    database::{
        Database,
        repositories::{SeaOrmCatalogStore, SeaOrmJobStore},
    },
    ingestor::CatalogSyncHandler,
    job_scheduling::{Job, JobExecutor, JobPayload, JobQueue, JobQueueRunner, JobType},
    models::{NewScope, ScopeKind},
    repositories::{CatalogStore, InMemoryStore, JobStore, ScopeStore},
    sources::HttpM3uFetcher,
    utils::{Clock, SystemClock},
};

/// `--database-url` value selecting the in-memory store
const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Parser)]
#[command(name = "playlist-sync")]
#[command(version)]
#[command(about = "Scheduled M3U catalog synchronisation with a persistent job queue")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file); `memory` for a throwaway store
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level (overrides config file)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the job worker until interrupted
    Run,
    /// Queue a job
    Enqueue {
        #[arg(long = "type", value_enum)]
        job_type: JobTypeArg,
        /// Scope to synchronise (required for all but feed-data-sync)
        #[arg(long)]
        scope_id: Option<i64>,
        /// Delete missing entries instead of deactivating them
        #[arg(long)]
        destructive: bool,
        /// Attempt limit for this job (defaults to the per-type setting)
        #[arg(long)]
        max_attempts: Option<i32>,
    },
    /// Register a provider or playlist scope
    AddScope {
        #[arg(long, value_enum)]
        kind: ScopeKindArg,
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Register the scope disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Enable a scope
    EnableScope { id: i64 },
    /// Disable a scope
    DisableScope { id: i64 },
    /// List registered scopes
    Scopes,
    /// List recent jobs
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
    /// Show a single job by its correlation id
    Status { job_id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum JobTypeArg {
    ProviderSync,
    PlaylistSync,
    FeedDataSync,
    GuideGen,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeKindArg {
    Provider,
    Playlist,
}

impl From<ScopeKindArg> for ScopeKind {
    fn from(kind: ScopeKindArg) -> Self {
        match kind {
            ScopeKindArg::Provider => ScopeKind::Provider,
            ScopeKindArg::Playlist => ScopeKind::Playlist,
        }
    }
}

impl JobTypeArg {
    fn payload(self, scope_id: Option<i64>, destructive: bool) -> Result<JobPayload> {
        let require_scope = || scope_id.context("--scope-id is required for this job type");
        Ok(match self {
            JobTypeArg::ProviderSync => JobPayload::ProviderSync {
                scope_id: require_scope()?,
                allow_destructive_retirement: destructive,
            },
            JobTypeArg::PlaylistSync => JobPayload::PlaylistSync {
                scope_id: require_scope()?,
                allow_destructive_retirement: destructive,
            },
            JobTypeArg::FeedDataSync => JobPayload::FeedDataSync,
            JobTypeArg::GuideGen => JobPayload::GuideGen {
                scope_id: require_scope()?,
            },
        })
    }
}

/// Store handles shared by every command
struct Stores {
    jobs: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogStore>,
    scopes: Arc<dyn ScopeStore>,
}

impl Stores {
    async fn open(config: &Config) -> Result<Self> {
        if config.database.url == MEMORY_DATABASE_URL {
            warn!("Using the in-memory store; nothing will be persisted");
            let store = Arc::new(InMemoryStore::new());
            return Ok(Self {
                jobs: store.clone(),
                catalog: store.clone(),
                scopes: store,
            });
        }

        info!("Using database: {}", config.database.url);
        let database = Database::new(&config.database).await?;
        database.migrate().await?;
        info!("Database connection established and migrations applied");

        let catalog = Arc::new(SeaOrmCatalogStore::new(database.connection()));
        Ok(Self {
            jobs: Arc::new(SeaOrmJobStore::new(database.connection())),
            catalog: catalog.clone(),
            scopes: catalog,
        })
    }
}

fn init_logging(level: &str, json: bool) {
    let log_filter = format!("playlist_sync={level}");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn set_scope_enabled(stores: &Stores, clock: &dyn Clock, id: i64, enabled: bool) -> Result<()> {
    if !stores.scopes.set_scope_enabled(id, enabled, clock.now()).await? {
        anyhow::bail!("Scope {} does not exist", id);
    }
    info!("Scope {} {}", id, if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn print_job(job: &Job) {
    println!(
        "{:>6}  {}  {:<14}  {:<11}  {:>3}/{:<9}  {}",
        job.id,
        job.job_id,
        job.job_type(),
        job.state,
        job.attempt_count,
        job.max_attempts
            .map(|m| m.to_string())
            .unwrap_or_else(|| "Unlimited".to_string()),
        job.status_description.as_deref().unwrap_or("-")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }
    if cli.log_json {
        config.logging.json = true;
    }

    init_logging(&config.logging.level, config.logging.json);
    info!("Starting playlist-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = Stores::open(&config).await?;
    let queue = JobQueue::new(stores.jobs.clone(), clock.clone(), config.scheduler.clone());

    match cli.command {
        Command::Run => {
            let fetcher = Arc::new(HttpM3uFetcher::new(&config.fetcher)?);
            let handler = Arc::new(CatalogSyncHandler::new(
                stores.catalog.clone(),
                fetcher,
                clock.clone(),
            ));
            let executor = JobExecutor::new()
                .register(JobType::ProviderSync, handler.clone())
                .register(JobType::PlaylistSync, handler)
                .reject_unhandled();

            let runner = JobQueueRunner::new(
                stores.jobs.clone(),
                Arc::new(executor),
                clock.clone(),
                &config.scheduler,
            );

            let cancellation_token = CancellationToken::new();
            let shutdown = cancellation_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown requested");
                }
                shutdown.cancel();
            });

            runner.run(cancellation_token).await?;
        }
        Command::Enqueue {
            job_type,
            scope_id,
            destructive,
            max_attempts,
        } => {
            let payload = job_type.payload(scope_id, destructive)?;
            let job = queue.enqueue(payload, max_attempts).await?;
            println!("{}", job.job_id);
        }
        Command::AddScope {
            kind,
            name,
            url,
            disabled,
        } => {
            let scope = stores
                .scopes
                .create_scope(
                    NewScope {
                        kind: kind.into(),
                        name,
                        url,
                        is_enabled: !disabled,
                    },
                    clock.now(),
                )
                .await?;
            println!("{}", scope.id);
        }
        Command::EnableScope { id } => set_scope_enabled(&stores, clock.as_ref(), id, true).await?,
        Command::DisableScope { id } => {
            set_scope_enabled(&stores, clock.as_ref(), id, false).await?
        }
        Command::Scopes => {
            for scope in stores.scopes.list_scopes().await? {
                println!(
                    "{:>6}  {:<8}  {:<8}  {:<24}  {}",
                    scope.id,
                    scope.kind,
                    if scope.is_enabled { "enabled" } else { "disabled" },
                    scope.name,
                    scope.url
                );
            }
        }
        Command::Jobs { limit } => {
            for job in queue.recent(limit).await? {
                print_job(&job);
            }
        }
        Command::Status { job_id } => match queue.status(job_id).await? {
            Some(job) => print_job(&job),
            None => anyhow::bail!("Job {} not found", job_id),
        },
    }

    Ok(())
}
