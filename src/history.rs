//! Listing commands: `codesearcher history` and `codesearcher snippets`.

use anyhow::Result;

use crate::config::Config;
use crate::store::sqlite::SqliteHistoryStore;
use crate::store::{HistoryStore, PageRequest};

pub async fn run_history(
    config: &Config,
    page: u32,
    size: u32,
    session: Option<String>,
) -> Result<()> {
    let request = PageRequest::new(page, size)?;
    let store = SqliteHistoryStore::open(config).await?;
    let history = store.find_page(session.as_deref(), request).await;
    store.close().await;
    let history = history?;

    if history.content.is_empty() {
        println!("No searches recorded.");
        return Ok(());
    }

    for item in &history.content {
        println!(
            "{:>6}  {}  {:<32}  results={}",
            item.id,
            item.timestamp.format("%Y-%m-%d %H:%M:%S"),
            item.query,
            item.total_results
        );
    }
    println!(
        "page {}/{} ({} searches)",
        history.page_number + 1,
        history.total_pages.max(1),
        history.total_elements
    );

    Ok(())
}

pub async fn run_snippets(config: &Config, text: &str, page: u32, size: u32) -> Result<()> {
    let request = PageRequest::new(page, size)?;
    let store = SqliteHistoryStore::open(config).await?;
    let snippets = store.find_snippets_by_full_text(text, request).await;
    store.close().await;
    let snippets = snippets?;

    if snippets.content.is_empty() {
        println!("No snippets found.");
        return Ok(());
    }

    for (i, snippet) in snippets.content.iter().enumerate() {
        println!(
            "{}. [{}] {} ({}) search={}",
            request.offset() + i as i64 + 1,
            snippet.id,
            snippet.path,
            snippet.repository,
            snippet.search_id
        );
        println!("    {}", snippet.url);
    }
    println!("{} matching snippets", snippets.total_elements);

    Ok(())
}
