//! Request validation for `POST /api/search` and the lookup endpoints.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::error::{Error, FieldErrors, Result};
use crate::github::SearchParams;

static LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9+#]*$").unwrap());
static REPOSITORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-_./]*$").unwrap());
static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.[a-zA-Z0-9]*$").unwrap());

const BLANK_QUERY: &str = "Search query cannot be empty";

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    #[validate(length(
        min = 3,
        max = 100,
        message = "Query must be between 3 and 100 characters"
    ))]
    pub query: String,

    #[validate(regex(
        path = *LANGUAGE_RE,
        message = "Language must contain only alphanumeric characters and + or #"
    ))]
    pub language: Option<String>,

    #[validate(regex(
        path = *REPOSITORY_RE,
        message = "Repository must be in format 'owner/repo'"
    ))]
    pub repository: Option<String>,

    #[validate(regex(
        path = *EXTENSION_RE,
        message = "File extension must start with a dot followed by alphanumeric characters"
    ))]
    pub file_extension: Option<String>,
}

impl SearchRequest {
    /// Blank optional filters become `None`.
    pub fn normalized(self) -> Self {
        Self {
            query: self.query,
            language: blank_to_none(self.language),
            repository: blank_to_none(self.repository),
            file_extension: blank_to_none(self.file_extension),
        }
    }

    /// Normalizes, validates and converts into [`SearchParams`].
    pub fn into_params(self) -> Result<SearchParams> {
        let request = self.normalized();

        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        if request.query.trim().is_empty() {
            errors.insert("query".to_string(), BLANK_QUERY.to_string());
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        Ok(SearchParams {
            query: request.query,
            language: request.language,
            repository: request.repository,
            extension: request.file_extension,
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Flattens validator output to one message per JSON field name.
fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        if let Some(first) = errs.first() {
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| first.code.to_string());
            out.insert(json_field_name(&field), message);
        }
    }
    out
}

fn json_field_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Rejects blank full-text input.
pub fn require_text(field: &str, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::invalid(field, "Search text cannot be empty"));
    }
    Ok(())
}
