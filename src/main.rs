//! # Code Searcher CLI (`codesearcher`)
//!
//! ## Usage
//!
//! ```bash
//! codesearcher --config ./config/codesearcher.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codesearcher init` | Create the SQLite database and run schema migrations |
//! | `codesearcher serve` | Start the HTTP API |
//! | `codesearcher search "<query>"` | Search GitHub and store the result |
//! | `codesearcher history` | List stored searches, newest first |
//! | `codesearcher get <id>` | Show one stored search with its snippets |
//! | `codesearcher snippets "<text>"` | Full-text search over stored snippets |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use code_searcher::{config, get, history, logging, migrate, search, server};

/// Code Searcher: search GitHub code and keep a searchable history.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/codesearcher.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "codesearcher",
    about = "Code Searcher: search GitHub code and keep a searchable history",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/codesearcher.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the search_history,
    /// code_snippet and code_snippet_fts tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to `[server].bind` and runs until interrupted with Ctrl-C.
    Serve,

    /// Search GitHub code and store the result.
    Search {
        /// Free-text query (3 to 100 characters).
        query: String,

        /// Language qualifier, e.g. `rust` or `c++`.
        #[arg(long)]
        language: Option<String>,

        /// Repository qualifier in `owner/repo` form.
        #[arg(long)]
        repository: Option<String>,

        /// File extension including the leading dot, e.g. `.rs`.
        #[arg(long)]
        extension: Option<String>,
    },

    /// List stored searches, newest first.
    History {
        /// Zero-based page number.
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size (1 to 100).
        #[arg(long, default_value_t = 10)]
        size: u32,

        /// Only show searches from this session id.
        #[arg(long)]
        session: Option<String>,
    },

    /// Show one stored search with its snippets.
    Get {
        /// Search id.
        id: i64,
    },

    /// Full-text search over stored snippet content.
    Snippets {
        /// Text to match.
        text: String,

        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        size: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            query,
            language,
            repository,
            extension,
        } => {
            search::run_search(&cfg, &query, language, repository, extension).await?;
        }
        Commands::History {
            page,
            size,
            session,
        } => {
            history::run_history(&cfg, page, size, session).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Snippets { text, page, size } => {
            history::run_snippets(&cfg, &text, page, size).await?;
        }
    }

    Ok(())
}
