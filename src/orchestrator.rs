//! Search orchestration.
//!
//! ```text
//! search ──▶ parse owner/repo ──▶ fetch contents (concurrent, ordered)
//!        ──▶ drop empty ──▶ save record + snippets (one transaction)
//! ```
//!
//! An upstream search failure aborts before anything is written. Content
//! failures only remove the affected item.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::github::client::SearchClient;
use crate::github::SearchParams;
use crate::models::{now_millis, NewSearchRecord, NewSnippet, SearchRecord};
use crate::repo_url::parse_owner_repo;
use crate::session::SessionToken;
use crate::store::HistoryStore;

pub struct SearchOrchestrator {
    client: Arc<SearchClient>,
    store: Arc<dyn HistoryStore>,
    fetch_concurrency: usize,
}

impl SearchOrchestrator {
    pub fn new(
        client: Arc<SearchClient>,
        store: Arc<dyn HistoryStore>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            client,
            store,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Runs one search end to end and returns the persisted record.
    pub async fn execute(
        &self,
        params: SearchParams,
        session: &SessionToken,
    ) -> Result<SearchRecord> {
        let timestamp = now_millis();
        let outcome = self.client.search(&params).await?;

        if outcome.incomplete {
            tracing::warn!(query = %params.query, "search results are incomplete");
        }

        let candidates: Vec<_> = outcome
            .items
            .into_iter()
            .filter_map(|item| match parse_owner_repo(&item.html_url) {
                Some((owner, repo)) => Some((item, owner, repo)),
                None => {
                    tracing::warn!(url = %item.html_url, "discarding item with unrecognised URL");
                    None
                }
            })
            .collect();
        let candidate_count = candidates.len();

        let client = &self.client;
        let fetched: Vec<_> = stream::iter(candidates)
            .map(|(item, owner, repo)| async move {
                let content = client.fetch_content(&owner, &repo, &item.path).await;
                (item, owner, repo, content)
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let snippets: Vec<NewSnippet> = fetched
            .into_iter()
            .filter(|(item, _, _, content)| {
                if content.is_empty() {
                    tracing::debug!(path = %item.path, "discarding item without content");
                }
                !content.is_empty()
            })
            .map(|(item, owner, repo, content)| NewSnippet {
                name: item.name,
                path: item.path,
                repository: format!("{}/{}", owner, repo),
                url: item.html_url,
                content,
                language: item.language,
                size: item.size,
            })
            .collect();

        let record = NewSearchRecord {
            query: params.query,
            language: params.language,
            repository: params.repository,
            file_extension: params.extension,
            timestamp,
            session_id: session.as_str().to_string(),
            snippets,
        };
        let saved = self.store.save(record).await?;

        tracing::info!(
            search_id = saved.id,
            candidates = candidate_count,
            total_results = saved.total_results,
            "search persisted"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::github::client::ClientSettings;
    use crate::github::{CandidateItem, ContentFile, SearchPage, UpstreamApi, UpstreamError};
    use crate::resilience::breaker::BreakerPolicy;
    use crate::resilience::SystemClock;
    use crate::store::memory::InMemoryHistoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeApi {
        items: Vec<CandidateItem>,
        /// path → (delay, base64 content)
        files: HashMap<String, (u64, String)>,
        fail: bool,
    }

    #[async_trait]
    impl UpstreamApi for FakeApi {
        async fn search_code(&self, _query: &str) -> std::result::Result<SearchPage, UpstreamError> {
            if self.fail {
                return Err(UpstreamError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(SearchPage {
                total_count: self.items.len() as u64,
                incomplete_results: false,
                items: self.items.clone(),
            })
        }

        async fn file_content(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
        ) -> std::result::Result<ContentFile, UpstreamError> {
            let (delay, content) = self.files.get(path).cloned().unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ContentFile {
                content: Some(content),
                encoding: Some("base64".to_string()),
            })
        }
    }

    fn item(path: &str) -> CandidateItem {
        CandidateItem {
            name: path.to_string(),
            path: path.to_string(),
            html_url: format!("https://github.com/acme/widgets/blob/main/{}", path),
            language: Some("Go".to_string()),
            size: Some(3),
        }
    }

    fn orchestrator(api: FakeApi) -> (SearchOrchestrator, Arc<InMemoryHistoryStore>) {
        let settings = ClientSettings {
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 16,
            breaker: BreakerPolicy {
                failure_rate_threshold: 50.0,
                sliding_window_size: 10,
                minimum_calls: 10,
                open_duration: Duration::from_secs(30),
                half_open_max_calls: 1,
            },
        };
        let client = Arc::new(SearchClient::with_settings(
            Arc::new(api),
            settings,
            Arc::new(SystemClock),
        ));
        let store = Arc::new(InMemoryHistoryStore::new());
        (SearchOrchestrator::new(client, store.clone(), 4), store)
    }

    #[tokio::test]
    async fn empty_content_items_are_dropped() {
        let (orch, store) = orchestrator(FakeApi {
            items: vec![item("good.go"), item("empty.go")],
            files: HashMap::from([
                ("good.go".to_string(), (0, "cGFja2FnZSBh".to_string())),
                ("empty.go".to_string(), (0, String::new())),
            ]),
            fail: false,
        });
        let session = SessionToken::fixed("s1");

        let record = orch
            .execute(SearchParams::new("parser").language("go"), &session)
            .await
            .unwrap();

        assert_eq!(record.total_results, 1);
        assert_eq!(record.snippets.len(), 1);
        assert_eq!(record.snippets[0].content, "package a");
        assert_eq!(record.snippets[0].repository, "acme/widgets");
        assert_eq!(record.language.as_deref(), Some("go"));
        assert_eq!(record.session_id, "s1");

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.total_results, 1);
    }

    #[tokio::test]
    async fn upstream_failure_persists_nothing() {
        let (orch, store) = orchestrator(FakeApi {
            items: vec![],
            files: HashMap::new(),
            fail: true,
        });

        let err = orch
            .execute(SearchParams::new("parser"), &SessionToken::fixed("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(store.count_records().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn result_order_follows_upstream_not_completion() {
        let (orch, _) = orchestrator(FakeApi {
            items: vec![item("slow.go"), item("fast.go")],
            files: HashMap::from([
                ("slow.go".to_string(), (500, "c2xvdw==".to_string())),
                ("fast.go".to_string(), (1, "ZmFzdA==".to_string())),
            ]),
            fail: false,
        });

        let record = orch
            .execute(SearchParams::new("order"), &SessionToken::fixed("s"))
            .await
            .unwrap();
        let contents: Vec<_> = record.snippets.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn unparseable_urls_are_discarded() {
        let mut bad = item("bad.go");
        bad.html_url = "https://github.com/blob/x/bad.go".to_string();
        let (orch, _) = orchestrator(FakeApi {
            items: vec![bad, item("good.go")],
            files: HashMap::from([
                ("bad.go".to_string(), (0, "YmFk".to_string())),
                ("good.go".to_string(), (0, "Z29vZA==".to_string())),
            ]),
            fail: false,
        });

        let record = orch
            .execute(SearchParams::new("urls"), &SessionToken::fixed("s"))
            .await
            .unwrap();
        assert_eq!(record.total_results, 1);
        assert_eq!(record.snippets[0].content, "good");
    }

    #[tokio::test]
    async fn repeated_searches_create_new_records() {
        let (orch, store) = orchestrator(FakeApi {
            items: vec![item("a.go")],
            files: HashMap::from([("a.go".to_string(), (0, "YQ==".to_string()))]),
            fail: false,
        });
        let session = SessionToken::fixed("s");

        let first = orch.execute(SearchParams::new("same"), &session).await.unwrap();
        let second = orch.execute(SearchParams::new("same"), &session).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.count_records().await.unwrap(), 2);
    }
}
