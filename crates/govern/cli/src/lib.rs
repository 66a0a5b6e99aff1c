//! govctl - command-line interface for governed reference data
//!
//! This CLI gives operators a terminal interface to:
//! - Manage accounts and lookup entries
//! - Submit bulk uploads from JSON files
//! - Review, approve and reject pending tasks
//! - Inspect dashboard statistics
//!
//! Every command acts as the account named by `--actor`; its role decides
//! whether a mutation applies immediately or waits for approval.

use clap::{Parser, Subcommand};
use govern_storage::sqlite::SqliteGovernanceStorage;
use govern_types::Actor;
use govern_workflow::WorkflowEngine;
use std::ffi::OsString;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod fields;
mod output;

use commands::{account, bulk, lookup, stats, task};
pub use config::{GovernConfig, LoggingConfig, SeedAccount, SeedConfig, StorageConfig};
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// govctl application
#[derive(Parser)]
#[command(name = "govctl")]
#[command(about = "govctl - governed reference data administration", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GOVERN_CONFIG")]
    config: Option<String>,

    /// Username of the acting account
    #[arg(short, long, env = "GOVERN_ACTOR")]
    actor: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create the configured bootstrap accounts if missing
    Seed,

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Manage lookup entries
    Lookup {
        #[command(subcommand)]
        command: lookup::LookupCommands,
    },

    /// Upload many records from a JSON file
    Bulk {
        #[command(subcommand)]
        command: bulk::BulkCommands,
    },

    /// Review and resolve tasks
    Task {
        #[command(subcommand)]
        command: task::TaskCommands,
    },

    /// Show dashboard statistics
    Stats,
}

/// State shared by every command.
pub(crate) struct Context {
    pub engine: WorkflowEngine,
    pub format: OutputFormat,
    actor: Option<String>,
}

impl Context {
    /// The acting account, looked up in the store.
    pub async fn actor(&self) -> CliResult<Actor> {
        let username = self.actor.as_deref().ok_or(CliError::MissingActor)?;
        Ok(self.engine.actor_for(username).await?)
    }

    /// The acting account, checked for read access.
    pub async fn viewer(&self) -> CliResult<Actor> {
        let actor = self.actor().await?;
        self.engine.authorize_view(&actor)?;
        Ok(actor)
    }
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = GovernConfig::load(cli.config.as_deref())?;

    init_tracing(&config.logging, cli.verbose);

    let engine = open_engine(&config.storage).await?;
    let ctx = Context {
        engine,
        format: cli.output,
        actor: cli.actor,
    };

    match cli.command {
        Commands::Seed => seed(&ctx, config.seed).await,
        Commands::Account { command } => account::execute(command, &ctx).await,
        Commands::Lookup { command } => lookup::execute(command, &ctx).await,
        Commands::Bulk { command } => bulk::execute(command, &ctx).await,
        Commands::Task { command } => task::execute(command, &ctx).await,
        Commands::Stats => stats::execute(&ctx).await,
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    // A second initialisation in the same process keeps the first subscriber.
    let _ = if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
}

async fn open_engine(storage: &StorageConfig) -> CliResult<WorkflowEngine> {
    match storage {
        StorageConfig::Memory => {
            tracing::debug!("using in-memory storage");
            Ok(WorkflowEngine::in_memory())
        }
        StorageConfig::Sqlite {
            url,
            max_connections,
        } => {
            tracing::debug!(url = %url, "opening sqlite storage");
            let storage =
                SqliteGovernanceStorage::connect_with_options(url, *max_connections).await?;
            Ok(WorkflowEngine::new(Arc::new(storage)))
        }
    }
}

async fn seed(ctx: &Context, seed: SeedConfig) -> CliResult<()> {
    let drafts = seed
        .accounts
        .into_iter()
        .map(SeedAccount::into_draft)
        .collect::<Vec<_>>();
    let requested = drafts.len();
    let created = ctx.engine.bootstrap_accounts(drafts).await?;
    output::render_value(
        ctx.format,
        &serde_json::json!({ "requested": requested, "created": created }),
        &format!("Seeded {created} of {requested} accounts"),
    )
}
