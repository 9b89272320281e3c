//! Resilient wrapper around an [`UpstreamApi`].
//!
//! Each call passes through, outermost first:
//!
//! ```text
//!   cache ──▶ circuit breaker ──▶ timeout ──▶ UpstreamApi
//! ```
//!
//! One breaker is shared by searches and content fetches. Each operation
//! has its own cache keyed by the exact parameter tuple.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{decode_content, SearchOutcome, SearchParams, UpstreamApi, UpstreamError};
use crate::config::Config;
use crate::resilience::breaker::{BreakerPolicy, BreakerState, CircuitBreaker};
use crate::resilience::cache::TtlCache;
use crate::resilience::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContentKey {
    owner: String,
    repo: String,
    path: String,
}

/// Knobs for [`SearchClient::with_settings`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub breaker: BreakerPolicy,
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.github.timeout(),
            cache_ttl: config.cache.ttl(),
            cache_capacity: config.cache.max_entries,
            breaker: BreakerPolicy::from(&config.circuit_breaker),
        }
    }
}

pub struct SearchClient {
    api: Arc<dyn UpstreamApi>,
    breaker: CircuitBreaker,
    search_cache: TtlCache<SearchParams, SearchOutcome>,
    content_cache: TtlCache<ContentKey, String>,
    timeout: Duration,
}

impl SearchClient {
    pub fn new(api: Arc<dyn UpstreamApi>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(api, ClientSettings::from(config), clock)
    }

    pub fn with_settings(
        api: Arc<dyn UpstreamApi>,
        settings: ClientSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            breaker: CircuitBreaker::new("github", settings.breaker, clock.clone()),
            search_cache: TtlCache::new(
                settings.cache_capacity,
                settings.cache_ttl,
                clock.clone(),
            ),
            content_cache: TtlCache::new(settings.cache_capacity, settings.cache_ttl, clock),
            timeout: settings.timeout,
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Runs a code search.
    ///
    /// Returns [`SearchOutcome::fallback`] without contacting upstream while
    /// the breaker is open. A failure of an admitted call is recorded in the
    /// breaker and returned as an error.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, UpstreamError> {
        if let Some(hit) = self.search_cache.get(params) {
            tracing::debug!(query = %params.query, "search cache hit");
            return Ok(hit);
        }

        let query = params.upstream_query();
        match self.guarded(self.api.search_code(&query)).await {
            Ok(Some(page)) => {
                let outcome = SearchOutcome::from(page);
                if !outcome.incomplete {
                    self.search_cache.insert(params.clone(), outcome.clone());
                }
                Ok(outcome)
            }
            Ok(None) => {
                tracing::warn!(query = %params.query, "circuit open, returning fallback search result");
                Ok(SearchOutcome::fallback())
            }
            Err(e) => {
                tracing::error!(query = %params.query, error = %e, "GitHub search failed");
                Err(e)
            }
        }
    }

    /// Fetches and decodes one file. Never fails: any problem yields an
    /// empty string.
    pub async fn fetch_content(&self, owner: &str, repo: &str, path: &str) -> String {
        let key = ContentKey {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
        };
        if let Some(hit) = self.content_cache.get(&key) {
            tracing::debug!(owner, repo, path, "content cache hit");
            return hit;
        }

        let file = match self.guarded(self.api.file_content(owner, repo, path)).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                tracing::debug!(owner, repo, path, "circuit open, skipping content fetch");
                return String::new();
            }
            Err(e) => {
                tracing::warn!(owner, repo, path, error = %e, "content fetch failed");
                return String::new();
            }
        };

        match decode_content(&file) {
            Ok(content) => {
                if !content.is_empty() {
                    self.content_cache.insert(key, content.clone());
                }
                content
            }
            Err(e) => {
                tracing::warn!(owner, repo, path, error = %e, "content could not be decoded");
                String::new()
            }
        }
    }

    /// Runs `call` under the breaker and the timeout. `Ok(None)` means the
    /// breaker rejected the call.
    async fn guarded<T, F>(&self, call: F) -> Result<Option<T>, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        let Some(permit) = self.breaker.try_acquire() else {
            return Ok(None);
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(Some(value))
            }
            Ok(Err(e)) => {
                permit.failure();
                Err(e)
            }
            Err(_) => {
                permit.failure();
                Err(UpstreamError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{CandidateItem, ContentFile, SearchPage};
    use crate::resilience::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedApi {
        fail_search: Mutex<bool>,
        hang: bool,
        search_calls: AtomicUsize,
        content_calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UpstreamApi for ScriptedApi {
        async fn search_code(&self, query: &str) -> Result<SearchPage, UpstreamError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if *self.fail_search.lock().unwrap() {
                return Err(UpstreamError::Status {
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(SearchPage {
                total_count: 1,
                incomplete_results: false,
                items: vec![CandidateItem {
                    name: "a.go".to_string(),
                    path: "a.go".to_string(),
                    html_url: "https://github.com/o/r/blob/main/a.go".to_string(),
                    language: Some("Go".to_string()),
                    size: Some(10),
                }],
            })
        }

        async fn file_content(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
        ) -> Result<ContentFile, UpstreamError> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            match path {
                "missing.go" => Err(UpstreamError::Status {
                    status: 404,
                    body: String::new(),
                }),
                "empty.go" => Ok(ContentFile::default()),
                _ => Ok(ContentFile {
                    content: Some("cGFja2FnZSBh".to_string()),
                    encoding: Some("base64".to_string()),
                }),
            }
        }
    }

    fn settings() -> ClientSettings {
        ClientSettings {
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 16,
            breaker: BreakerPolicy {
                failure_rate_threshold: 50.0,
                sliding_window_size: 2,
                minimum_calls: 2,
                open_duration: Duration::from_secs(30),
                half_open_max_calls: 1,
            },
        }
    }

    fn client(api: Arc<ScriptedApi>) -> (SearchClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let client = SearchClient::with_settings(api, settings(), clock.clone());
        (client, clock)
    }

    #[tokio::test]
    async fn identical_searches_hit_the_cache() {
        let api = Arc::new(ScriptedApi::default());
        let (client, _) = client(api.clone());
        let params = SearchParams::new("parser").language("go");

        let first = client.search(&params).await.unwrap();
        let second = client.search(&params).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.queries.lock().unwrap()[0], "parser language:go");
    }

    #[tokio::test]
    async fn different_filters_are_different_keys() {
        let api = Arc::new(ScriptedApi::default());
        let (client, _) = client(api.clone());

        client.search(&SearchParams::new("parser")).await.unwrap();
        client
            .search(&SearchParams::new("parser").language("go"))
            .await
            .unwrap();

        assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let api = Arc::new(ScriptedApi::default());
        let (client, clock) = client(api.clone());
        let params = SearchParams::new("parser");

        client.search(&params).await.unwrap();
        clock.advance(Duration::from_secs(61));
        client.search(&params).await.unwrap();

        assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn admitted_failure_surfaces_then_breaker_falls_back() {
        let api = Arc::new(ScriptedApi::default());
        *api.fail_search.lock().unwrap() = true;
        let (client, _) = client(api.clone());

        for q in ["one", "two"] {
            let err = client.search(&SearchParams::new(q)).await.unwrap_err();
            assert!(matches!(err, UpstreamError::Status { status: 503, .. }));
        }
        assert_eq!(client.breaker_state(), BreakerState::Open);

        let outcome = client.search(&SearchParams::new("three")).await.unwrap();
        assert_eq!(outcome, SearchOutcome::fallback());
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn breaker_recovers_after_cool_down() {
        let api = Arc::new(ScriptedApi::default());
        *api.fail_search.lock().unwrap() = true;
        let (client, clock) = client(api.clone());

        for q in ["one", "two"] {
            let _ = client.search(&SearchParams::new(q)).await;
        }
        assert_eq!(client.breaker_state(), BreakerState::Open);

        *api.fail_search.lock().unwrap() = false;
        clock.advance(Duration::from_secs(30));

        let outcome = client.search(&SearchParams::new("three")).await.unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(client.breaker_state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn fallback_is_not_cached() {
        let api = Arc::new(ScriptedApi::default());
        *api.fail_search.lock().unwrap() = true;
        let (client, clock) = client(api.clone());
        let params = SearchParams::new("parser");

        let _ = client.search(&SearchParams::new("a")).await;
        let _ = client.search(&SearchParams::new("b")).await;
        assert_eq!(client.search(&params).await.unwrap(), SearchOutcome::fallback());

        *api.fail_search.lock().unwrap() = false;
        clock.advance(Duration::from_secs(30));
        let outcome = client.search(&params).await.unwrap();
        assert!(!outcome.incomplete);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_search_times_out() {
        let api = Arc::new(ScriptedApi {
            hang: true,
            ..ScriptedApi::default()
        });
        let (client, _) = client(api);

        let err = client.search(&SearchParams::new("slow")).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout(_)));
    }

    #[tokio::test]
    async fn content_is_decoded_and_cached() {
        let api = Arc::new(ScriptedApi::default());
        let (client, _) = client(api.clone());

        assert_eq!(client.fetch_content("o", "r", "a.go").await, "package a");
        assert_eq!(client.fetch_content("o", "r", "a.go").await, "package a");
        assert_eq!(api.content_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn content_failures_become_empty_strings() {
        let api = Arc::new(ScriptedApi::default());
        let (client, _) = client(api.clone());

        assert_eq!(client.fetch_content("o", "r", "empty.go").await, "");
        assert_eq!(client.fetch_content("o", "r", "empty.go").await, "");
        // Empty content is never cached.
        assert_eq!(api.content_calls.load(Ordering::SeqCst), 2);

        assert_eq!(client.fetch_content("o", "r", "missing.go").await, "");
    }

    #[tokio::test]
    async fn content_failures_trip_the_shared_breaker() {
        let api = Arc::new(ScriptedApi::default());
        let (client, _) = client(api.clone());

        client.fetch_content("o", "r", "missing.go").await;
        client.fetch_content("o", "r", "missing.go").await;
        assert_eq!(client.breaker_state(), BreakerState::Open);

        let outcome = client.search(&SearchParams::new("parser")).await.unwrap();
        assert_eq!(outcome, SearchOutcome::fallback());
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
    }
}
