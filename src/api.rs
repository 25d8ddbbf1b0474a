//! HTTP API
//!
//! Thin axum layer over [`FileStore`]. Routes:
//! - `GET /health`
//! - `POST|GET|PUT|DELETE /file?filename=<name>` (raw body, `Content-Type` header)
//! - `POST /fix/:block_id`

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::storage::{FileMetadata, FileStore, RebuildReport, StorageError};

/// Plain `{"detail": ...}` message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg {
    pub detail: String,
}

impl Msg {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Response body of `POST /fix/:block_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResponse {
    pub detail: String,
    #[serde(flatten)]
    pub report: RebuildReport,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub filename: String,
}

/// Storage errors rendered as `{"detail": ...}` with the matching status
#[derive(Debug)]
pub struct ApiError(StorageError);

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let detail = match &self.0 {
            StorageError::Conflict(_) => "File already exists".to_string(),
            StorageError::NotFound(_) => "File not found".to_string(),
            StorageError::PayloadTooLarge { .. } => "File too large".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(Msg { detail })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Extra room the transport accepts past the store's size cap, so the store
/// decides oversized writes after its own existence checks.
const BODY_LIMIT_SLACK: usize = 64 * 1024 * 1024;

/// Build the router for `store`
pub fn router(store: Arc<FileStore>) -> Router {
    let body_limit = store.max_size().saturating_add(BODY_LIMIT_SLACK);
    Router::new()
        .route("/health", get(health))
        .route(
            "/file",
            post(create_file)
                .get(read_file)
                .put(update_file)
                .delete(delete_file),
        )
        .route("/fix/:block_id", post(fix_block))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(store)
}

async fn health() -> Json<Msg> {
    Json(Msg::new("Service healthy"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

#[instrument(skip(store, headers, body), fields(size = body.len()))]
async fn create_file(
    State(store): State<Arc<FileStore>>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<FileMetadata>)> {
    let metadata = store
        .create(&query.filename, &body, content_type(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

#[instrument(skip(store))]
async fn read_file(
    State(store): State<Arc<FileStore>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<impl IntoResponse> {
    let data = store.read(&query.filename).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    ))
}

#[instrument(skip(store, headers, body), fields(size = body.len()))]
async fn update_file(
    State(store): State<Arc<FileStore>>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<FileMetadata>> {
    let metadata = store
        .update(&query.filename, &body, content_type(&headers))
        .await?;
    Ok(Json(metadata))
}

#[instrument(skip(store))]
async fn delete_file(
    State(store): State<Arc<FileStore>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<Msg>> {
    store.delete(&query.filename).await?;
    Ok(Json(Msg::new("File deleted")))
}

#[instrument(skip(store))]
async fn fix_block(
    State(store): State<Arc<FileStore>>,
    Path(block_id): Path<usize>,
) -> ApiResult<(StatusCode, Json<FixResponse>)> {
    info!(block_id, "Rebuilding shard directory");
    let report = store.rebuild(block_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(FixResponse {
            detail: "Block fixed".to_string(),
            report,
        }),
    ))
}
