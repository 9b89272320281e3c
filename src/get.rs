//! Search retrieval by id (`codesearcher get`).

use anyhow::Result;

use crate::config::Config;
use crate::dto::SearchResponse;
use crate::search::print_search;
use crate::store::sqlite::SqliteHistoryStore;
use crate::store::HistoryStore;

pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let store = SqliteHistoryStore::open(config).await?;
    let record = store.find_by_id(id).await;
    store.close().await;

    match record? {
        Some(record) => {
            print_search(&SearchResponse::from(record));
            Ok(())
        }
        None => {
            eprintln!("Error: Search history not found with id: {}", id);
            std::process::exit(1);
        }
    }
}
