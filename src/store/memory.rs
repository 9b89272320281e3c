//! In-memory [`HistoryStore`] for tests and embedding.
//!
//! Uses `Vec` behind `std::sync::RwLock`. Full-text matching tokenizes
//! snippet content with [`search_terms`] and ranks by the number of matching
//! term occurrences.

use std::sync::RwLock;

use async_trait::async_trait;

use super::{search_terms, HistoryStore, Page, PageRequest};
use crate::error::{Error, Result};
use crate::models::{NewSearchRecord, SearchRecord, SearchSummary, Snippet};

#[derive(Default)]
struct Tables {
    records: Vec<SearchRecord>,
    next_record_id: i64,
    next_snippet_id: i64,
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let content = items
        .iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .cloned()
        .collect();
    Page::new(content, page, items.len() as i64)
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save(&self, record: NewSearchRecord) -> Result<SearchRecord> {
        // Same constraints as the SQLite CHECKs.
        if record.query.is_empty() {
            return Err(Error::invalid("query", "Search query cannot be empty"));
        }
        if record.snippets.iter().any(|s| s.content.is_empty()) {
            return Err(Error::invalid("content", "Snippet content cannot be empty"));
        }

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());

        tables.next_record_id += 1;
        let id = tables.next_record_id;
        let total_results = record.total_results();

        let mut snippets = Vec::with_capacity(record.snippets.len());
        for s in record.snippets {
            tables.next_snippet_id += 1;
            snippets.push(Snippet {
                id: tables.next_snippet_id,
                search_id: id,
                name: s.name,
                path: s.path,
                repository: s.repository,
                url: s.url,
                content: s.content,
                language: s.language,
                size: s.size,
            });
        }

        let stored = SearchRecord {
            id,
            query: record.query,
            language: record.language,
            repository: record.repository,
            file_extension: record.file_extension,
            timestamp: record.timestamp,
            total_results,
            session_id: record.session_id,
            snippets,
        };
        tables.records.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SearchRecord>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_page(
        &self,
        session_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<SearchSummary>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());

        let mut matching: Vec<SearchSummary> = tables
            .records
            .iter()
            .filter(|r| session_id.map_or(true, |s| r.session_id == s))
            .map(SearchSummary::from)
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(paginate(&matching, page))
    }

    async fn find_snippets_by_full_text(
        &self,
        text: &str,
        page: PageRequest,
    ) -> Result<Page<Snippet>> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return Ok(Page::new(Vec::new(), page, 0));
        }

        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, &Snippet)> = tables
            .records
            .iter()
            .flat_map(|r| r.snippets.iter())
            .filter_map(|s| {
                let hits = search_terms_all(&s.content)
                    .iter()
                    .filter(|t| terms.contains(t))
                    .count();
                (hits > 0).then_some((hits, s))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        let matches: Vec<Snippet> = scored.into_iter().map(|(_, s)| s.clone()).collect();
        Ok(paginate(&matches, page))
    }

    async fn count_records(&self) -> Result<i64> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.records.len() as i64)
    }
}

/// Every token of `text`, duplicates kept.
fn search_terms_all(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
