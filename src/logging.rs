//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the configured level when present. Output is either
//! human-readable or one JSON object per line (`[logging] json = true`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so CLI output on stdout stays clean.
    if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "code_searcher={},codesearcher={},tower_http=info,sqlx=warn",
            config.level, config.level
        ))
    })
}
