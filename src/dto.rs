//! JSON response bodies of the REST API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{SearchRecord, SearchSummary, Snippet};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnippetDto {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub repository: String,
    pub url: String,
    pub content: String,
    pub language: Option<String>,
    pub size: Option<i64>,
}

impl From<Snippet> for SnippetDto {
    fn from(s: Snippet) -> Self {
        Self {
            id: s.id,
            name: s.name,
            path: s.path,
            repository: s.repository,
            url: s.url,
            content: s.content,
            language: s.language,
            size: s.size,
        }
    }
}

/// Full search detail, returned by `POST /api/search` and
/// `GET /api/search/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_id: i64,
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub file_extension: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub total_results: i64,
    pub snippets: Vec<SnippetDto>,
}

impl From<SearchRecord> for SearchResponse {
    fn from(r: SearchRecord) -> Self {
        Self {
            search_id: r.id,
            query: r.query,
            language: r.language,
            repository: r.repository,
            file_extension: r.file_extension,
            timestamp: r.timestamp,
            total_results: r.total_results,
            snippets: r.snippets.into_iter().map(SnippetDto::from).collect(),
        }
    }
}

/// History entry without snippet bodies. The session id is not exposed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub file_extension: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub total_results: i64,
}

impl From<SearchSummary> for HistoryItem {
    fn from(s: SearchSummary) -> Self {
        Self {
            id: s.id,
            query: s.query,
            language: s.language,
            repository: s.repository,
            file_extension: s.file_extension,
            timestamp: s.timestamp,
            total_results: s.total_results,
        }
    }
}
