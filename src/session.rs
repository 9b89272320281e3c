//! Anonymous session tokens.
//!
//! A token is a UUID carried in a cookie. Issuance depends only on whether
//! the request already presented a valid token: a valid one is reused, a
//! missing or malformed one is replaced by a freshly minted token.

use std::fmt;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Accepts only strings that parse as a UUID. The canonical hyphenated
    /// lowercase form is stored.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim())
            .ok()
            .map(|id| Self(id.hyphenated().to_string()))
    }

    /// Reuses `presented` when valid, otherwise mints a new token. The flag
    /// is `true` when a new token was issued.
    pub fn resolve(presented: Option<&str>) -> (Self, bool) {
        Self::resolve_with(presented, Uuid::new_v4)
    }

    pub fn resolve_with(presented: Option<&str>, mint: impl FnOnce() -> Uuid) -> (Self, bool) {
        match presented.and_then(Self::parse) {
            Some(token) => (token, false),
            None => (Self(mint().hyphenated().to_string()), true),
        }
    }

    /// A fixed, non-UUID token for callers that are not web clients.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of cookie `name` across all `Cookie` headers, if present.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}

/// Adds a `Set-Cookie` header that stores `token` under `name`.
pub fn set_cookie(headers: &mut HeaderMap, name: &str, token: &SessionToken) {
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, token);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    #[test]
    fn valid_token_is_reused() {
        let (token, issued) = SessionToken::resolve_with(Some(ID), || panic!("must not mint"));
        assert_eq!(token.as_str(), ID);
        assert!(!issued);
    }

    #[test]
    fn missing_or_invalid_token_is_replaced() {
        let fresh = Uuid::nil();
        for presented in [None, Some(""), Some("not-a-uuid")] {
            let (token, issued) = SessionToken::resolve_with(presented, || fresh);
            assert!(issued);
            assert_eq!(token.as_str(), fresh.hyphenated().to_string());
        }
    }

    #[test]
    fn uppercase_uuid_is_normalised() {
        let token = SessionToken::parse(&ID.to_uppercase()).unwrap();
        assert_eq!(token.as_str(), ID);
    }

    #[test]
    fn reads_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; SID=abc; b=2"));
        assert_eq!(cookie_value(&headers, "SID").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn writes_set_cookie() {
        let mut headers = HeaderMap::new();
        set_cookie(&mut headers, "SID", &SessionToken::fixed(ID));
        let value = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.starts_with(&format!("SID={};", ID)));
        assert!(value.contains("HttpOnly"));
    }
}
