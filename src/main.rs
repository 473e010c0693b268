//! relmap - Main entry point.
//!
//! Operational commands over a MySQL database: list tables, run a query,
//! inspect or create the join table between two tables. Results are printed
//! to stdout as JSON; logs go to stderr.

use relmap::config::{Command, Config, JoinTableAction};
use relmap::db::{Adapter, SqlLog, pool};
use relmap::inflector::Inflector;
use relmap::models::{EntityType, ModelCatalog};
use relmap::relationships::JoinTableOptions;
use serde_json::json;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    info!("Starting relmap v{}", env!("CARGO_PKG_VERSION"));

    let db_config = config.database_config()?;
    let pool = pool::connect(&db_config).await?;

    let sql_log = if db_config.log_sql {
        SqlLog::to_tracing()
    } else {
        SqlLog::default()
    };
    let adapter = Adapter::new(pool.clone()).with_sql_log(sql_log);

    let result = run(&adapter, config.command).await;
    pool.close().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        return Err(e);
    }
    Ok(())
}

async fn run(
    adapter: &Adapter<MySqlPool>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Tables => {
            let tables = adapter.list_tables().await?;
            println!("{}", serde_json::to_string_pretty(&tables)?);
        }
        Command::Query { sql, qualified } => {
            let count = adapter
                .query(&sql, qualified, |record| {
                    match serde_json::to_string(&record) {
                        Ok(line) => println!("{line}"),
                        Err(e) => error!(error = %e, "Failed to serialize row"),
                    }
                    Ok(())
                })
                .await?;
            info!(rows = count, "Query finished");
        }
        Command::JoinTable {
            action,
            source,
            destination,
        } => {
            let catalog = Arc::new(ModelCatalog::new(adapter.clone()));
            for table in [&source, &destination] {
                let name = catalog.inflector().classify(table);
                catalog.register(EntityType::new(name, table.as_str())).await;
            }

            let options = JoinTableOptions::default()
                .with_engine("InnoDB")
                .with_charset("utf8mb4");
            let join_table = catalog
                .join_table(source.as_str(), destination.as_str(), options)
                .await?;

            let report = match action {
                JoinTableAction::Status => json!({
                    "name": join_table.name(),
                    "keys": join_table.keys(),
                    "exists": join_table.exists().await?,
                }),
                JoinTableAction::Create => json!({
                    "name": join_table.name(),
                    "created": join_table.create_table().await?,
                }),
                JoinTableAction::Recreate => json!({
                    "name": join_table.name(),
                    "created": join_table.recreate_table().await?,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
