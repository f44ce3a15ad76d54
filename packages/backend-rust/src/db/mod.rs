pub mod config;
pub mod schema;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use thiserror::Error;

use crate::db::config::{DbConfig, DbMode};
use crate::db::schema::{split_sql_statements, MASTERY_SCHEMA_SQL};
use crate::store::memory::MemoryMasteryStore;
use crate::store::postgres::PgMasteryStore;
use crate::store::sqlite::SqliteMasteryStore;
use crate::store::MasteryStore;

/// Opens the store selected by `config.mode` and makes sure its tables exist.
pub async fn connect_store(config: &DbConfig) -> Result<Arc<dyn MasteryStore>, DbInitError> {
    let store: Arc<dyn MasteryStore> = match &config.mode {
        DbMode::ServerPostgres { url } => {
            let pool = connect_postgres(url, config).await?;
            Arc::new(PgMasteryStore::new(pool))
        }
        DbMode::DesktopSqlite { path } => {
            let pool = connect_sqlite(path, config).await?;
            Arc::new(SqliteMasteryStore::new(pool))
        }
        DbMode::InMemory => Arc::new(MemoryMasteryStore::new()),
    };

    tracing::info!(
        backend = store.backend(),
        target = %config.redacted_target(),
        "mastery store ready"
    );

    Ok(store)
}

pub async fn connect_postgres(url: &str, config: &DbConfig) -> Result<PgPool, DbInitError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(url)
        .await?;

    for stmt in split_sql_statements(MASTERY_SCHEMA_SQL) {
        sqlx::query(&stmt).execute(&pool).await?;
    }

    Ok(pool)
}

pub async fn connect_sqlite(
    path: &std::path::Path,
    config: &DbConfig,
) -> Result<SqlitePool, DbInitError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DbInitError::Io(e.to_string()))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| DbInitError::Config(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.sqlite_busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.min(5))
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    for stmt in split_sql_statements(MASTERY_SCHEMA_SQL) {
        sqlx::query(&stmt).execute(&pool).await?;
    }

    Ok(pool)
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
