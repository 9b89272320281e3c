//! GitHub code-search access.
//!
//! [`UpstreamApi`] is the raw seam: one HTTP round-trip per call, no
//! caching, no breaker. [`GithubHttpApi`](http::GithubHttpApi) implements
//! it with `reqwest`; tests substitute fakes. [`SearchClient`](client::SearchClient)
//! composes cache, circuit breaker and timeout around any `UpstreamApi`.

pub mod client;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

/// One hit from `GET /search/code`, before its content is fetched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CandidateItem {
    pub name: String,
    pub path: String,
    pub html_url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

/// Body of `GET /search/code`. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<CandidateItem>,
}

/// Body of `GET /repos/{owner}/{repo}/contents/{path}` for a file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentFile {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub API returned error: {status}")]
    Status { status: u16, body: String },

    #[error("could not decode GitHub response: {0}")]
    Decode(String),

    #[error("GitHub API call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Runs one code search with an already-qualified query string.
    async fn search_code(&self, query: &str) -> Result<SearchPage, UpstreamError>;

    /// Fetches the contents descriptor of a single file.
    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentFile, UpstreamError>;
}

/// Search parameters; also the search cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchParams {
    pub query: String,
    pub language: Option<String>,
    pub repository: Option<String>,
    pub extension: Option<String>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Free text followed by `language:`, `repo:` and `extension:`
    /// qualifiers for each non-empty filter. Dots are stripped from the
    /// extension.
    pub fn upstream_query(&self) -> String {
        let mut q = self.query.clone();

        if let Some(language) = non_empty(&self.language) {
            q.push_str(" language:");
            q.push_str(language);
        }
        if let Some(repository) = non_empty(&self.repository) {
            q.push_str(" repo:");
            q.push_str(repository);
        }
        if let Some(extension) = non_empty(&self.extension) {
            q.push_str(" extension:");
            q.push_str(&extension.replace('.', ""));
        }

        q
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Outcome of a guarded search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub items: Vec<CandidateItem>,
    /// Set when upstream flagged its results as partial, and on fallback.
    pub incomplete: bool,
}

impl SearchOutcome {
    /// Returned without contacting upstream while the breaker is open.
    pub fn fallback() -> Self {
        Self {
            items: Vec::new(),
            incomplete: true,
        }
    }
}

impl From<SearchPage> for SearchOutcome {
    fn from(page: SearchPage) -> Self {
        Self {
            items: page.items,
            incomplete: page.incomplete_results,
        }
    }
}

/// Decodes a contents descriptor into text.
///
/// Base64 payloads arrive wrapped at 60 columns, so all whitespace is
/// stripped before decoding. Any other encoding is taken verbatim.
pub fn decode_content(file: &ContentFile) -> Result<String, UpstreamError> {
    let Some(raw) = file.content.as_deref() else {
        return Ok(String::new());
    };

    match file.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| UpstreamError::Decode(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
        }
        Some(_) => Ok(raw.to_string()),
    }
}
