//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/search` | Search GitHub, persist and return the result |
//! | `GET`  | `/api/history` | Paginated search history, newest first |
//! | `GET`  | `/api/search/{id}` | One search with all of its snippets |
//! | `GET`  | `/api/snippets/search` | Full-text search over stored snippets |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api-docs/openapi.json` | OpenAPI document for the `/api` routes |
//!
//! # Error Contract
//!
//! Failures are `application/problem+json`:
//!
//! ```json
//! {
//!   "type": "https://api.codesearcher.com/errors/validation",
//!   "title": "Validation Error",
//!   "status": 400,
//!   "detail": "Validation failed",
//!   "timestamp": "2024-05-01T10:00:00.000Z",
//!   "errors": { "query": "Query must be between 3 and 100 characters" }
//! }
//! ```
//!
//! # Sessions
//!
//! Anonymous callers are identified by a UUID cookie (`[server].session_cookie`).
//! `POST /api/search` and `GET /api/history?currentUserOnly=true` issue one
//! when the request carries none or an invalid one.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::config::Config;
use crate::dto::{HistoryItem, SearchResponse, SnippetDto};
use crate::error::Error;
use crate::github::client::SearchClient;
use crate::github::http::GithubHttpApi;
use crate::orchestrator::SearchOrchestrator;
use crate::resilience::SystemClock;
use crate::session::{cookie_value, set_cookie, SessionToken};
use crate::store::sqlite::SqliteHistoryStore;
use crate::store::{HistoryStore, Page, PageRequest};
use crate::validation::{require_text, SearchRequest};

const ERROR_TYPE_BASE: &str = "https://api.codesearcher.com/errors";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<SearchOrchestrator>,
    store: Arc<dyn HistoryStore>,
    session_cookie: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, session_cookie: &str) -> Self {
        Self {
            store: orchestrator.store().clone(),
            orchestrator,
            session_cookie: Arc::from(session_cookie),
        }
    }

    fn session(&self, headers: &HeaderMap) -> (SessionToken, bool) {
        let presented = cookie_value(headers, &self.session_cookie);
        SessionToken::resolve(presented.as_deref())
    }

    fn session_headers(&self, token: &SessionToken, issued: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if issued {
            set_cookie(&mut headers, &self.session_cookie, token);
        }
        headers
    }
}

/// Builds the router with CORS and request tracing.
///
/// An empty `cors_origins` list allows any origin.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/search", post(handle_search))
        .route("/api/search/{id}", get(handle_get_search))
        .route("/api/history", get(handle_history))
        .route("/api/snippets/search", get(handle_snippet_search))
        .route("/health", get(handle_health))
        .route("/api-docs/openapi.json", get(handle_openapi))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Opens the database, wires the GitHub client and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(config).await?);

    let api = Arc::new(GithubHttpApi::new(&config.github)?);
    let client = Arc::new(SearchClient::new(api, config, Arc::new(SystemClock)));
    let orchestrator = Arc::new(SearchOrchestrator::new(
        client,
        store,
        config.github.fetch_concurrency,
    ));

    let state = AppState::new(orchestrator, &config.server.session_cookie);
    let app = router(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

/// RFC 7807 problem body.
#[derive(Serialize, ToSchema)]
struct ProblemDetail {
    #[serde(rename = "type")]
    kind: String,
    title: String,
    status: u16,
    detail: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
}

fn problem(status: StatusCode, slug: &str, title: &str, detail: String) -> ProblemDetail {
    ProblemDetail {
        kind: format!("{}/{}", ERROR_TYPE_BASE, slug),
        title: title.to_string(),
        status: status.as_u16(),
        detail,
        timestamp: now_iso(),
        errors: None,
    }
}

fn now_iso() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Error::Validation(errors) => {
                tracing::debug!(?errors, "validation failed");
                let mut body = problem(
                    StatusCode::BAD_REQUEST,
                    "validation",
                    "Validation Error",
                    "Validation failed".to_string(),
                );
                body.errors = Some(errors);
                (StatusCode::BAD_REQUEST, body)
            }
            Error::NotFound(message) => {
                tracing::debug!(%message, "resource not found");
                (
                    StatusCode::NOT_FOUND,
                    problem(
                        StatusCode::NOT_FOUND,
                        "not-found",
                        "Resource Not Found",
                        message,
                    ),
                )
            }
            Error::Upstream(e) => {
                tracing::error!(error = %e, "GitHub API error");
                (
                    StatusCode::BAD_GATEWAY,
                    problem(
                        StatusCode::BAD_GATEWAY,
                        "external-api",
                        "GitHub API Error",
                        format!("Failed to search GitHub code: {}", e),
                    ),
                )
            }
            other => {
                tracing::error!(error = ?other, "unexpected error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    problem(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "server",
                        "Internal Server Error",
                        "An unexpected error occurred".to_string(),
                    ),
                )
            }
        };

        (
            status,
            [(CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}

/// Maps extractor rejections (bad JSON, bad query strings, bad path ids)
/// onto the validation problem shape.
fn rejection(field: &str, message: impl std::fmt::Display) -> Error {
    Error::invalid(field, message.to_string())
}

// ============ OpenAPI ============

#[derive(OpenApi)]
#[openapi(
    paths(handle_search, handle_get_search, handle_history, handle_snippet_search),
    components(schemas(
        SearchRequest,
        SearchResponse,
        SnippetDto,
        HistoryItem,
        ProblemDetail
    )),
    tags((name = "search", description = "GitHub code search with stored history")),
    info(
        title = "Code Searcher API",
        description = "Searches GitHub code and serves the stored history and snippets"
    )
)]
pub struct ApiDoc;

async fn handle_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/search ============

#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search ran and was stored", body = SearchResponse),
        (status = 400, description = "Invalid request", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 502, description = "GitHub API error", body = ProblemDetail, content_type = "application/problem+json"),
        (status = 500, description = "Internal server error", body = ProblemDetail, content_type = "application/problem+json")
    ),
    tag = "search"
)]
async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(request) = body.map_err(|e| rejection("body", e.body_text()))?;
    let params = request.into_params()?;

    let (session, issued) = state.session(&headers);
    let record = state.orchestrator.execute(params, &session).await?;

    Ok((
        state.session_headers(&session, issued),
        Json(SearchResponse::from(record)),
    ))
}

// ============ GET /api/search/{id} ============

#[utoipa::path(
    get,
    path = "/api/search/{id}",
    params(("id" = i64, Path, description = "Search id")),
    responses(
        (status = 200, description = "Stored search with its snippets", body = SearchResponse),
        (status = 404, description = "Unknown search id", body = ProblemDetail, content_type = "application/problem+json")
    ),
    tag = "search"
)]
async fn handle_get_search(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SearchResponse>, Error> {
    let Path(id) = id.map_err(|e| rejection("id", e.body_text()))?;

    let record = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| Error::search_not_found(id))?;

    Ok(Json(SearchResponse::from(record)))
}

// ============ GET /api/history ============

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
struct HistoryParams {
    /// Zero-based page number.
    #[serde(default)]
    page: u32,
    /// Page size, 1 to 100.
    #[serde(default = "default_page_size")]
    size: u32,
    /// Only searches made with the caller's session cookie.
    #[serde(default = "default_current_user_only")]
    current_user_only: bool,
}

fn default_page_size() -> u32 {
    10
}

fn default_current_user_only() -> bool {
    true
}

#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Newest-first page of searches", body = Page<HistoryItem>),
        (status = 400, description = "Invalid paging", body = ProblemDetail, content_type = "application/problem+json")
    ),
    tag = "search"
)]
async fn handle_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(params) = params.map_err(|e| rejection("query", e.body_text()))?;
    let page = PageRequest::new(params.page, params.size)?;

    let (session, issued) = if params.current_user_only {
        let (token, issued) = state.session(&headers);
        (Some(token), issued)
    } else {
        (None, false)
    };

    let history = state
        .store
        .find_page(session.as_ref().map(SessionToken::as_str), page)
        .await?
        .map(HistoryItem::from);

    let mut response_headers = HeaderMap::new();
    if let Some(token) = &session {
        response_headers = state.session_headers(token, issued);
    }
    Ok((response_headers, Json(history)))
}

// ============ GET /api/snippets/search ============

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SnippetSearchParams {
    /// Text to match against snippet content.
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: u32,
    #[serde(default = "default_page_size")]
    size: u32,
}

#[utoipa::path(
    get,
    path = "/api/snippets/search",
    params(SnippetSearchParams),
    responses(
        (status = 200, description = "Snippets ranked by relevance", body = Page<SnippetDto>),
        (status = 400, description = "Blank text or invalid paging", body = ProblemDetail, content_type = "application/problem+json")
    ),
    tag = "search"
)]
async fn handle_snippet_search(
    State(state): State<AppState>,
    params: Result<Query<SnippetSearchParams>, QueryRejection>,
) -> Result<Json<Page<SnippetDto>>, Error> {
    let Query(params) = params.map_err(|e| rejection("query", e.body_text()))?;
    require_text("q", &params.q)?;
    let page = PageRequest::new(params.page, params.size)?;

    let snippets = state
        .store
        .find_snippets_by_full_text(&params.q, page)
        .await?
        .map(SnippetDto::from);

    Ok(Json(snippets))
}
