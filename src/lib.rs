//! # Code Searcher
//!
//! A backend that proxies code-search queries to GitHub, persists every
//! search together with the snippets it produced, and serves paginated
//! history and full-text lookup over what was stored.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │   HTTP   │──▶│ Orchestrator │──▶│ SearchClient │──▶│  GitHub  │
//! │  / CLI   │   └──────┬───────┘   │ cache+breaker│   │ REST API │
//! └────┬─────┘          │           └──────────────┘   └──────────┘
//!      │                ▼
//!      │         ┌──────────────┐
//!      └────────▶│    SQLite    │
//!                │ history+FTS5 │
//!                └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! codesearcher init                         # create database
//! codesearcher search "tokio::select" --language rust
//! codesearcher history
//! codesearcher serve                        # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`github`] | Upstream API, HTTP client and resilient wrapper |
//! | [`resilience`] | Circuit breaker, TTL cache, clocks |
//! | [`orchestrator`] | Search → fetch → filter → persist |
//! | [`store`] | History store and snippet full-text index |
//! | [`server`] | HTTP API |
//! | [`session`] | Anonymous session tokens |
//! | [`validation`] | Request validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod get;
pub mod github;
pub mod history;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod repo_url;
pub mod resilience;
pub mod search;
pub mod server;
pub mod session;
pub mod store;
pub mod validation;
