//! Process wiring: loads config, applies migrations, drives the executor
//! against a block event feed, and serves the read-only API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tablesql_core::config::Config;
use tablesql_core::SqlValidator;
use tablesql_ethereum::{BlockEventsSource, FixtureBlockEventsSource};
use tablesql_storage::{BasicSqlValidator, Executor, ReadPool, SystemService};

#[derive(Parser)]
#[command(name = "tablesql", about = "Event-driven SQL execution engine for chain-materialized tables")]
struct Cli {
    #[arg(long, default_value = "tablesql.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Opens the database and applies all embedded migrations, then exits.
    Migrate,
    /// Drives the executor against a block feed and serves the read-only API.
    Run {
        /// JSON file of `BlockEvents` to replay; an empty feed if omitted.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Migrate => run_migrate(&config),
        Command::Run { fixture } => run(&config, fixture).await,
    }
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    Config::from_toml_str(&text).map_err(|e| anyhow::anyhow!(e.to_string()))
}

fn default_validator() -> Arc<dyn SqlValidator> {
    Arc::new(BasicSqlValidator::new())
}

fn run_migrate(config: &Config) -> Result<()> {
    let acquire_timeout = Duration::from_millis(config.executor.write_permit_acquire_timeout_ms);
    let _executor = Executor::open(&config.executor.database_path, default_validator(), acquire_timeout)?;
    tracing::info!(database_path = %config.executor.database_path, "migrations applied");
    Ok(())
}

async fn run(config: &Config, fixture: Option<PathBuf>) -> Result<()> {
    let acquire_timeout = Duration::from_millis(config.executor.write_permit_acquire_timeout_ms);
    let executor = Executor::open(&config.executor.database_path, default_validator(), acquire_timeout)?;

    let read_pool = ReadPool::open(&config.executor.database_path, config.executor.read_pool_size)?;
    let system_service = Arc::new(SystemService::new(read_pool));

    let api_router = tablesql_api::router(system_service);
    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr).await?;
    tracing::info!(addr = %config.api.bind_addr, "api listening");
    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api_router).await {
            tracing::error!(error = %e, "api server exited");
        }
    });

    let mut source: Box<dyn BlockEventsSource> = match fixture {
        Some(path) => {
            let data = std::fs::read_to_string(&path).with_context(|| format!("reading fixture {}", path.display()))?;
            Box::new(FixtureBlockEventsSource::from_json(&data).map_err(|e| anyhow::anyhow!(e.to_string()))?)
        }
        None => Box::new(FixtureBlockEventsSource::new(Vec::new())),
    };

    while let Some(block) = source.next_block().await.map_err(|e| anyhow::anyhow!(e.to_string()))? {
        let max_row_count = config.chains.get(&block.chain_id.0).map(|c| c.max_table_row_count).unwrap_or(0);
        let now = chrono::Utc::now().timestamp();

        let mut scope = executor
            .new_block_scope(block.chain_id, block.block_number, max_row_count, now)
            .await?;

        let mut infra_failure = None;
        for txn in &block.txns {
            match scope.execute_txn_events(txn).await {
                Ok(outcome) if outcome.skipped => {
                    tracing::debug!(txn_hash = %outcome.txn_hash, "transaction already processed, skipped");
                }
                Ok(outcome) => {
                    if let Some(error) = &outcome.error {
                        tracing::warn!(txn_hash = %outcome.txn_hash, error = %error.wire_code(), "transaction failed");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, block_number = block.block_number, "infrastructure failure, aborting block");
                    infra_failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = infra_failure {
            scope.close().await?;
            return Err(anyhow::anyhow!(e.to_string()));
        }

        scope.set_last_processed_height(block.block_number).await?;
        scope.commit().await?;
    }

    api_handle.abort();
    Ok(())
}
