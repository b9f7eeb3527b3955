//! Database initialization
//!
//! Opens (creating on first run) the SQLite file and bootstraps every table
//! of the schema registry that does not exist yet.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::executor::QueryExecutor;
use crate::db::schema::SchemaRegistry;
use crate::Result;

/// Open a connection pool on `db_path`.
///
/// Pragmas are set per connection so every pooled connection enforces
/// foreign keys and waits on a locked database instead of failing at once.
pub async fn connect(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Create every registry table that is missing (safe to call repeatedly).
/// Returns the names of the tables created by this call.
pub async fn bootstrap_schema(pool: &SqlitePool, schema: &'static SchemaRegistry) -> Result<Vec<String>> {
    let mut executor = QueryExecutor::acquire_with_schema(pool, schema).await?;
    let mut created = Vec::new();

    for table in schema.tables() {
        if executor.has_table(&table.name).await? {
            debug!("Table exists: {}", table.name);
            continue;
        }

        executor.create_table(table).await?;
        info!("Created table: {}", table.name);
        created.push(table.name.clone());
    }

    Ok(created)
}
