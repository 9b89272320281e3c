//! Core data models.
//!
//! A [`SearchRecord`] owns its [`Snippet`]s: they are written together in a
//! single transaction and deleted together via `ON DELETE CASCADE`. Neither
//! is mutated after creation.

use chrono::{DateTime, SubsecRound, Utc};

/// A snippet ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnippet {
    pub name: String,
    pub path: String,
    /// `owner/repo`.
    pub repository: String,
    pub url: String,
    /// Never empty.
    pub content: String,
    pub language: Option<String>,
    pub size: Option<i64>,
}

/// A search record and its snippets, before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewSearchRecord {
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub file_extension: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub snippets: Vec<NewSnippet>,
}

impl NewSearchRecord {
    pub fn total_results(&self) -> i64 {
        self.snippets.len() as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub id: i64,
    pub search_id: i64,
    pub name: String,
    pub path: String,
    pub repository: String,
    pub url: String,
    pub content: String,
    pub language: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    pub id: i64,
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub file_extension: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub total_results: i64,
    pub session_id: String,
    pub snippets: Vec<Snippet>,
}

/// A search record without its snippets, as listed in history pages.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub id: i64,
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub file_extension: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub total_results: i64,
    pub session_id: String,
}

impl From<&SearchRecord> for SearchSummary {
    fn from(record: &SearchRecord) -> Self {
        Self {
            id: record.id,
            query: record.query.clone(),
            language: record.language.clone(),
            repository: record.repository.clone(),
            file_extension: record.file_extension.clone(),
            timestamp: record.timestamp,
            total_results: record.total_results,
            session_id: record.session_id.clone(),
        }
    }
}

/// Current time at the millisecond precision the store keeps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn timestamp_from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
