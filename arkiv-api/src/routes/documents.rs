//! Mutating routes: refresh, delete and full reindex.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    domain::search::{ContentType, SyncStats},
    routes::error_response,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:slug", delete(delete_document))
        .route("/:slug/refresh", post(refresh_document))
}

pub fn reindex_router() -> Router<AppState> {
    Router::new().route("/", post(reindex))
}

/// Check the bearer token on mutating routes. With no token configured the
/// routes stay open (local development).
fn authorize(app_state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let Some(ref expected) = app_state.admin_token else {
        return Ok(());
    };

    let provided = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "Invalid admin token".to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DocumentQuery {
    content_type: Option<String>,
}

#[instrument(name = "DELETE /documents/:slug", skip(app_state, headers))]
async fn delete_document(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    authorize(&app_state, &headers)?;

    let content_type = query.content_type.as_deref().map(ContentType::normalize);
    let deleted = app_state
        .indexer
        .delete_document(&slug, content_type)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "slug": slug, "deleted_chunks": deleted })))
}

#[instrument(name = "POST /documents/:slug/refresh", skip(app_state, headers))]
async fn refresh_document(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    authorize(&app_state, &headers)?;

    let content_type = query.content_type.as_deref().map(ContentType::normalize);
    let written = app_state
        .indexer
        .refresh_from_source(&slug, content_type)
        .await
        .map_err(error_response)?;

    match written {
        Some(chunks) => Ok(Json(json!({ "slug": slug, "indexed_chunks": chunks }))),
        None => Err((StatusCode::NOT_FOUND, "Unknown document".to_string())),
    }
}

#[instrument(name = "POST /reindex", skip(app_state, headers))]
async fn reindex(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncStats>, (StatusCode, String)> {
    authorize(&app_state, &headers)?;

    let stats = app_state
        .indexer
        .reindex_all()
        .await
        .map_err(error_response)?;

    Ok(Json(stats))
}
