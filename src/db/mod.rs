mod models;
mod seeders;

pub use models::*;
pub use seeders::seed_level_thresholds;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments.
///
/// Comment text is stripped before the statement split so a ';' inside a
/// `--` comment cannot cut a statement in half. Migration files must not
/// put `--` inside string literals.
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    let stripped: String = sql
        .lines()
        .map(|line| line.split_once("--").map(|(code, _)| code).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in stripped.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("classhub.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = connect(&db_url).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

async fn connect(db_url: &str) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Core school schema
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    // Migration 002: Online test module
    let has_tests_table: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='tests'")
            .fetch_optional(pool)
            .await?;
    if has_tests_table.is_none() {
        execute_sql(pool, include_str!("../../migrations/002_online_tests.sql")).await?;
    }

    // Seed default placement thresholds (no-op once present)
    seeders::seed_level_thresholds(pool).await?;

    info!("Migrations completed");
    Ok(())
}

/// In-memory database with the full schema, for tests.
#[cfg(test)]
pub async fn test_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    execute_sql(&pool, include_str!("../../migrations/001_initial.sql"))
        .await
        .unwrap();
    execute_sql(&pool, include_str!("../../migrations/002_online_tests.sql"))
        .await
        .unwrap();
    seeders::seed_level_thresholds(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn comment_semicolons_do_not_split_statements() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let sql = "-- minor currency units; NULL means free\n\
                   CREATE TABLE t (\n\
                       v INTEGER -- unused; reserved\n\
                   );\n\
                   INSERT INTO t (v) VALUES (1);";
        execute_sql(&pool, sql).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn migration_files_execute_cleanly() {
        // test_pool runs both migration files plus the seeders
        let pool = test_pool().await;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM level_thresholds")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 5);
    }
}
