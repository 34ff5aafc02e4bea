//! Database module for SQLite persistence.
//!
//! SQLite backs the default storage engine: one row per stored item.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::error!("Failed to create database directory {:?}: {}", parent, e);
            return Err(e.into());
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            user_id INTEGER NOT NULL,
            collection TEXT NOT NULL,
            item_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            modified_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, collection, item_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Listing filters on modification time within one user's collection
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_items_modified
            ON items(user_id, collection, modified_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
