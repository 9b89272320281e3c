//! Configuration loading.
//!
//! All settings live in a single TOML file passed with `--config`. Only
//! `[db]` and `[server]` are required; every other section falls back to
//! defaults suitable for talking to `api.github.com`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Name of the cookie carrying the anonymous session token.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_session_cookie() -> String {
    "CODESEARCHER_SESSION".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Personal access token. Falls back to `GITHUB_TOKEN` when unset.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            items_per_page: default_items_per_page(),
            timeout_secs: default_timeout_secs(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}
fn default_items_per_page() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_fetch_concurrency() -> usize {
    4
}

impl GithubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured token, or `GITHUB_TOKEN` from the environment.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    600
}
fn default_cache_max_entries() -> usize {
    1000
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure percentage at which the breaker opens.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: usize,
    #[serde(default = "default_open_duration_secs")]
    pub open_duration_secs: u64,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_failure_rate_threshold(),
            sliding_window_size: default_sliding_window_size(),
            minimum_calls: default_minimum_calls(),
            open_duration_secs: default_open_duration_secs(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

fn default_failure_rate_threshold() -> f64 {
    50.0
}
fn default_sliding_window_size() -> usize {
    20
}
fn default_minimum_calls() -> usize {
    10
}
fn default_open_duration_secs() -> u64 {
    30
}
fn default_half_open_max_calls() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.github.items_per_page == 0 || config.github.items_per_page > 100 {
        anyhow::bail!("github.items_per_page must be in [1, 100]");
    }

    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }

    if config.github.fetch_concurrency == 0 {
        anyhow::bail!("github.fetch_concurrency must be > 0");
    }

    if config.cache.max_entries == 0 {
        anyhow::bail!("cache.max_entries must be > 0");
    }

    let cb = &config.circuit_breaker;
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        anyhow::bail!("circuit_breaker.failure_rate_threshold must be in (0, 100]");
    }
    if cb.sliding_window_size == 0 {
        anyhow::bail!("circuit_breaker.sliding_window_size must be > 0");
    }
    if cb.minimum_calls == 0 || cb.minimum_calls > cb.sliding_window_size {
        anyhow::bail!("circuit_breaker.minimum_calls must be in [1, sliding_window_size]");
    }
    if cb.half_open_max_calls == 0 {
        anyhow::bail!("circuit_breaker.half_open_max_calls must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/codesearcher.sqlite"

[server]
bind = "127.0.0.1:8080"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();

        assert_eq!(config.server.session_cookie, "CODESEARCHER_SESSION");
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.items_per_page, 10);
        assert_eq!(config.github.timeout(), Duration::from_secs(5));
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.circuit_breaker.minimum_calls, 10);
        assert!(!config.logging.json);
    }

    #[test]
    fn rejects_minimum_calls_above_window() {
        let text = format!(
            "{}\n[circuit_breaker]\nsliding_window_size = 5\nminimum_calls = 6\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&text).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("minimum_calls"));
    }

    #[test]
    fn rejects_oversized_page() {
        let text = format!("{}\n[github]\nitems_per_page = 500\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn explicit_token_wins() {
        let github = GithubConfig {
            token: Some("abc".to_string()),
            ..GithubConfig::default()
        };
        assert_eq!(github.resolved_token().as_deref(), Some("abc"));
    }
}
