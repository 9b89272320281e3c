//! `reqwest` implementation of [`UpstreamApi`] against the GitHub REST API.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;

use super::{ContentFile, SearchPage, UpstreamApi, UpstreamError};
use crate::config::GithubConfig;

/// Upper bound on the bytes read from an error body.
const MAX_ERROR_BODY: usize = 512;

pub struct GithubHttpApi {
    client: reqwest::Client,
    base_url: String,
    items_per_page: u32,
}

impl GithubHttpApi {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("codesearcher/{}", env!("CARGO_PKG_VERSION")))?,
        );
        if let Some(token) = config.resolved_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            items_per_page: config.items_per_page,
        })
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            encoded_path
        )
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UpstreamError> {
    let status = response.status();

    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: error_excerpt(response).await,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
}

/// Reads at most [`MAX_ERROR_BODY`] bytes of an error body, chunk by chunk.
async fn error_excerpt(mut response: reqwest::Response) -> String {
    let mut buf = Vec::with_capacity(MAX_ERROR_BODY);
    while buf.len() < MAX_ERROR_BODY {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(MAX_ERROR_BODY - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl UpstreamApi for GithubHttpApi {
    async fn search_code(&self, query: &str) -> Result<SearchPage, UpstreamError> {
        let url = format!("{}/search/code", self.base_url);
        tracing::info!(q = %query, per_page = self.items_per_page, "searching GitHub code");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query.to_string()),
                ("per_page", self.items_per_page.to_string()),
            ])
            .send()
            .await?;

        read_json(response).await
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ContentFile, UpstreamError> {
        let url = self.contents_url(owner, repo, path);
        tracing::debug!(%url, "fetching file content");

        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }
}
