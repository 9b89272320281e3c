//! Error taxonomy shared by the orchestrator, the history store and the
//! HTTP layer.
//!
//! Each variant maps to exactly one HTTP status (see `server.rs`):
//!
//! | Variant | Status |
//! |---------|--------|
//! | [`Error::Validation`] | 400 |
//! | [`Error::NotFound`] | 404 |
//! | [`Error::Upstream`] | 502 |
//! | [`Error::Database`], [`Error::Internal`] | 500 |

use std::collections::BTreeMap;

use thiserror::Error;

use crate::github::UpstreamError;

/// Field name → human-readable message.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {}", describe(.0))]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("failed to search GitHub code: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn describe(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Shorthand for a validation failure on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), message.into());
        Error::Validation(errors)
    }

    pub fn search_not_found(id: i64) -> Self {
        Error::NotFound(format!("Search history not found with id: {}", id))
    }
}
