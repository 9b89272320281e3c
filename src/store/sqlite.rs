//! SQLite-backed [`HistoryStore`].
//!
//! Tables `search_history` and `code_snippet` plus the FTS5 table
//! `code_snippet_fts`, created by [`crate::migrate`]. Snippet index rows are
//! written in the same transaction as the snippets themselves.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{fts_match_expression, HistoryStore, Page, PageRequest};
use crate::config::Config;
use crate::error::Result;
use crate::{db, migrate};
use crate::models::{
    timestamp_from_millis, NewSearchRecord, SearchRecord, SearchSummary, Snippet,
};

const SUMMARY_COLUMNS: &str =
    "id, query, language, repository, file_extension, timestamp, total_results, session_id";

const SNIPPET_COLUMNS: &str =
    "s.id, s.search_history_id, s.name, s.path, s.repository, s.url, s.content, s.language, s.size";

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the configured database, running migrations first.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        Self::open_path(&config.db.path).await
    }

    /// Migrates on a throwaway pool, then opens the pool used for queries.
    pub async fn open_path(db_path: &Path) -> anyhow::Result<Self> {
        migrate::migrate_path(db_path).await?;
        Ok(Self::new(db::connect_path(db_path).await?))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn snippets_of(&self, search_id: i64) -> Result<Vec<Snippet>> {
        let sql = format!(
            "SELECT {} FROM code_snippet s WHERE s.search_history_id = ? ORDER BY s.id ASC",
            SNIPPET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(search_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(snippet_from_row).collect()
    }
}

fn summary_from_row(row: &SqliteRow) -> Result<SearchSummary> {
    Ok(SearchSummary {
        id: row.try_get("id")?,
        query: row.try_get("query")?,
        language: row.try_get("language")?,
        repository: row.try_get("repository")?,
        file_extension: row.try_get("file_extension")?,
        timestamp: timestamp_from_millis(row.try_get("timestamp")?),
        total_results: row.try_get("total_results")?,
        session_id: row.try_get("session_id")?,
    })
}

fn snippet_from_row(row: &SqliteRow) -> Result<Snippet> {
    Ok(Snippet {
        id: row.try_get("id")?,
        search_id: row.try_get("search_history_id")?,
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        repository: row.try_get("repository")?,
        url: row.try_get("url")?,
        content: row.try_get("content")?,
        language: row.try_get("language")?,
        size: row.try_get("size")?,
    })
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn save(&self, record: NewSearchRecord) -> Result<SearchRecord> {
        let total_results = record.total_results();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO search_history (query, language, repository, file_extension,
                                        timestamp, total_results, session_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.query)
        .bind(&record.language)
        .bind(&record.repository)
        .bind(&record.file_extension)
        .bind(record.timestamp.timestamp_millis())
        .bind(total_results)
        .bind(&record.session_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut snippets = Vec::with_capacity(record.snippets.len());
        for snippet in record.snippets {
            let snippet_id = sqlx::query(
                r#"
                INSERT INTO code_snippet (search_history_id, name, path, repository, url,
                                          content, language, size)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(&snippet.name)
            .bind(&snippet.path)
            .bind(&snippet.repository)
            .bind(&snippet.url)
            .bind(&snippet.content)
            .bind(&snippet.language)
            .bind(snippet.size)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            sqlx::query("INSERT INTO code_snippet_fts (snippet_id, content) VALUES (?, ?)")
                .bind(snippet_id)
                .bind(&snippet.content)
                .execute(&mut *tx)
                .await?;

            snippets.push(Snippet {
                id: snippet_id,
                search_id: id,
                name: snippet.name,
                path: snippet.path,
                repository: snippet.repository,
                url: snippet.url,
                content: snippet.content,
                language: snippet.language,
                size: snippet.size,
            });
        }

        tx.commit().await?;

        Ok(SearchRecord {
            id,
            query: record.query,
            language: record.language,
            repository: record.repository,
            file_extension: record.file_extension,
            timestamp: record.timestamp,
            total_results,
            session_id: record.session_id,
            snippets,
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SearchRecord>> {
        let sql = format!("SELECT {} FROM search_history WHERE id = ?", SUMMARY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let summary = match row {
            Some(row) => summary_from_row(&row)?,
            None => return Ok(None),
        };
        let snippets = self.snippets_of(id).await?;

        Ok(Some(SearchRecord {
            id: summary.id,
            query: summary.query,
            language: summary.language,
            repository: summary.repository,
            file_extension: summary.file_extension,
            timestamp: summary.timestamp,
            total_results: summary.total_results,
            session_id: summary.session_id,
            snippets,
        }))
    }

    async fn find_page(
        &self,
        session_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<SearchSummary>> {
        let (total, rows) = match session_id {
            Some(session) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM search_history WHERE session_id = ?")
                        .bind(session)
                        .fetch_one(&self.pool)
                        .await?;
                let sql = format!(
                    "SELECT {} FROM search_history WHERE session_id = ? \
                     ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                    SUMMARY_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(session)
                    .bind(page.size as i64)
                    .bind(page.offset())
                    .fetch_all(&self.pool)
                    .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_history")
                    .fetch_one(&self.pool)
                    .await?;
                let sql = format!(
                    "SELECT {} FROM search_history \
                     ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                    SUMMARY_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(page.size as i64)
                    .bind(page.offset())
                    .fetch_all(&self.pool)
                    .await?;
                (total, rows)
            }
        };

        let content = rows
            .iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn find_snippets_by_full_text(
        &self,
        text: &str,
        page: PageRequest,
    ) -> Result<Page<Snippet>> {
        let Some(expr) = fts_match_expression(text) else {
            return Ok(Page::new(Vec::new(), page, 0));
        };

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM code_snippet_fts WHERE code_snippet_fts MATCH ?",
        )
        .bind(&expr)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM code_snippet_fts \
             JOIN code_snippet s ON s.id = code_snippet_fts.snippet_id \
             WHERE code_snippet_fts MATCH ? \
             ORDER BY rank, s.id \
             LIMIT ? OFFSET ?",
            SNIPPET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&expr)
            .bind(page.size as i64)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let content = rows
            .iter()
            .map(snippet_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, page, total))
    }

    async fn count_records(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
