//! One-off search from the command line (`codesearcher search`).
//!
//! Runs the same orchestration as `POST /api/search`, attributed to the
//! fixed session `cli`, and prints the persisted result.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::dto::SearchResponse;
use crate::error::Error;
use crate::github::client::SearchClient;
use crate::github::http::GithubHttpApi;
use crate::orchestrator::SearchOrchestrator;
use crate::resilience::SystemClock;
use crate::session::SessionToken;
use crate::store::sqlite::SqliteHistoryStore;
use crate::validation::SearchRequest;

pub const CLI_SESSION: &str = "cli";

pub async fn run_search(
    config: &Config,
    query: &str,
    language: Option<String>,
    repository: Option<String>,
    file_extension: Option<String>,
) -> Result<()> {
    let request = SearchRequest {
        query: query.to_string(),
        language,
        repository,
        file_extension,
    };
    let params = match request.into_params() {
        Ok(p) => p,
        Err(Error::Validation(errors)) => {
            for (field, message) in errors {
                eprintln!("Error: {}: {}", field, message);
            }
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    let store = Arc::new(SqliteHistoryStore::open(config).await?);
    let api = Arc::new(GithubHttpApi::new(&config.github)?);
    let client = Arc::new(SearchClient::new(api, config, Arc::new(SystemClock)));
    let orchestrator =
        SearchOrchestrator::new(client, store.clone(), config.github.fetch_concurrency);

    let result = orchestrator
        .execute(params, &SessionToken::fixed(CLI_SESSION))
        .await;
    store.close().await;

    let record = match result {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    print_search(&SearchResponse::from(record));
    Ok(())
}

/// Prints a search with its snippets. Shared with `codesearcher get`.
pub fn print_search(search: &SearchResponse) {
    println!("--- Search {} ---", search.search_id);
    println!("query:          {}", search.query);
    if let Some(ref language) = search.language {
        println!("language:       {}", language);
    }
    if let Some(ref repository) = search.repository {
        println!("repository:     {}", repository);
    }
    if let Some(ref ext) = search.file_extension {
        println!("file_extension: {}", ext);
    }
    println!("timestamp:      {}", search.timestamp.to_rfc3339());
    println!("total_results:  {}", search.total_results);

    for (i, snippet) in search.snippets.iter().enumerate() {
        println!();
        println!(
            "{}. {} ({}) {}",
            i + 1,
            snippet.path,
            snippet.repository,
            snippet.language.as_deref().unwrap_or("-")
        );
        println!("    {}", snippet.url);
        for line in snippet.content.lines().take(5) {
            println!("    | {}", line);
        }
    }
}
