//! Persistence for search history and the snippet full-text index.
//!
//! [`HistoryStore`] is implemented by [`SqliteHistoryStore`](sqlite::SqliteHistoryStore)
//! for production and by [`InMemoryHistoryStore`](memory::InMemoryHistoryStore)
//! for tests and embedding. Implementations must be `Send + Sync`.
//!
//! # Operations
//!
//! | Method | Description |
//! |--------|-------------|
//! | `save` | Atomically insert a record with all of its snippets |
//! | `find_by_id` | One record with snippets, in insertion order |
//! | `find_page` | Newest-first summaries, optionally for one session |
//! | `find_snippets_by_full_text` | Relevance-ranked snippet matches |
//! | `count_records` | Number of stored records |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::models::{NewSearchRecord, SearchRecord, SearchSummary, Snippet};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(Error::invalid(
                "size",
                format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

/// One page of results plus the totals needed to navigate.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = request.size.max(1) as i64;
        let total_pages = (total_elements + size - 1) / size;
        Self {
            content,
            page_number: request.page,
            page_size: request.size,
            total_elements,
            total_pages,
            last: request.page as i64 + 1 >= total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            last: self.last,
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Inserts the record, its snippets and their index entries as one
    /// unit. Returns the stored record with assigned ids.
    async fn save(&self, record: NewSearchRecord) -> Result<SearchRecord>;

    async fn find_by_id(&self, id: i64) -> Result<Option<SearchRecord>>;

    /// Newest first. `session_id = None` lists every session.
    async fn find_page(
        &self,
        session_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<SearchSummary>>;

    async fn find_snippets_by_full_text(
        &self,
        text: &str,
        page: PageRequest,
    ) -> Result<Page<Snippet>>;

    async fn count_records(&self) -> Result<i64>;
}

/// Splits free text into lowercase alphanumeric search terms, the same
/// way the FTS5 `unicode61` tokenizer does.
pub fn search_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Builds an FTS5 `MATCH` expression that ORs quoted terms, so user input
/// can never be parsed as query syntax. `None` when there is nothing to
/// search for.
pub fn fts_match_expression(text: &str) -> Option<String> {
    let terms = search_terms(text);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math() {
        let req = PageRequest::new(0, 10).unwrap();
        let page: Page<i32> = Page::new(vec![], req, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.last);

        let page: Page<i32> = Page::new(vec![], req, 25);
        assert_eq!(page.total_pages, 3);
        assert!(!page.last);

        let req = PageRequest::new(2, 10).unwrap();
        let page: Page<i32> = Page::new(vec![], req, 25);
        assert!(page.last);
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn page_size_bounds() {
        assert!(PageRequest::new(0, 0).is_err());
        assert!(PageRequest::new(0, 101).is_err());
        assert!(PageRequest::new(7, 100).is_ok());
    }

    #[test]
    fn page_serializes_camel_case() {
        let page = Page::new(vec![1], PageRequest::new(0, 10).unwrap(), 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageNumber"], 0);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalElements"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["last"], true);
    }

    #[test]
    fn match_expression_quotes_terms() {
        assert_eq!(
            fts_match_expression("HashMap::new()").as_deref(),
            Some("\"hashmap\" OR \"new\"")
        );
    }

    #[test]
    fn match_expression_neutralises_fts_syntax() {
        assert_eq!(
            fts_match_expression("foo AND \"bar* NEAR(baz)").as_deref(),
            Some("\"foo\" OR \"and\" OR \"bar\" OR \"near\" OR \"baz\"")
        );
    }

    #[test]
    fn punctuation_only_has_no_terms() {
        assert_eq!(fts_match_expression("  ::*()  "), None);
    }
}
