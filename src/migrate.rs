use std::path::Path;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    migrate_path(&config.db.path).await
}

/// Migrates the database at `db_path` on a pool of its own.
///
/// Connections that ran the DDL keep a stale schema view, so the pool is
/// closed before anything else touches the database.
pub async fn migrate_path(db_path: &Path) -> Result<()> {
    let pool = db::connect_path(db_path).await?;
    let result = migrate(&pool).await;
    pool.close().await;
    result
}

/// Creates every table, index and trigger. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // One row per orchestrated search; timestamp in epoch milliseconds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL CHECK (length(query) > 0),
            language TEXT,
            repository TEXT,
            file_extension TEXT,
            timestamp INTEGER NOT NULL,
            total_results INTEGER NOT NULL,
            session_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS code_snippet (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            search_history_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            repository TEXT NOT NULL,
            url TEXT NOT NULL,
            content TEXT NOT NULL CHECK (length(content) > 0),
            language TEXT,
            size INTEGER,
            FOREIGN KEY (search_history_id) REFERENCES search_history(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='code_snippet_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE code_snippet_fts USING fts5(
                snippet_id UNINDEXED,
                content
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    // Keep the index in step with cascading deletes
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS code_snippet_fts_delete
        AFTER DELETE ON code_snippet
        BEGIN
            DELETE FROM code_snippet_fts WHERE snippet_id = old.id;
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_code_snippet_search ON code_snippet(search_history_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_history_session ON search_history(session_id, timestamp DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_history_timestamp ON search_history(timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
