use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    domain::search::{ContentType, SortOrder},
    routes::error_response,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/:slug", get(get_post))
}

#[derive(Debug, Clone, Deserialize)]
struct ListQuery {
    page: Option<usize>,
    limit: Option<usize>,
    sort_by: Option<SortOrder>,
}

#[instrument(name = "GET /posts", skip(app_state))]
async fn list_posts(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let limit = query
        .limit
        .unwrap_or(app_state.max_posts_per_page)
        .clamp(1, app_state.max_posts_per_page);
    let page = query.page.unwrap_or(1).max(1);
    let sort_by = query.sort_by.unwrap_or_default();
    let offset = (page - 1) * limit;

    let posts = app_state
        .search_service
        .list_posts(limit, offset, sort_by)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "posts": posts,
        "pagination": { "page": page, "limit": limit },
    })))
}

#[derive(Debug, Clone, Deserialize)]
struct GetQuery {
    content_type: Option<String>,
    url: Option<String>,
}

#[instrument(name = "GET /posts/:slug", skip(app_state))]
async fn get_post(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let content_type = query
        .content_type
        .as_deref()
        .map(ContentType::normalize);

    let mut document = app_state
        .search_service
        .get_document(&slug, content_type, query.url.as_deref())
        .await
        .map_err(error_response)?;

    // Store miss: pull the document straight from the source, index it, and
    // try once more.
    if document.is_none() {
        let refreshed = app_state
            .indexer
            .refresh_from_source(&slug, content_type)
            .await
            .map_err(error_response)?;

        if refreshed.is_some() {
            document = app_state
                .search_service
                .get_document(&slug, content_type, query.url.as_deref())
                .await
                .map_err(error_response)?;
        }
    }

    let Some((summary, markdown)) = document else {
        return Err((StatusCode::NOT_FOUND, "Post not found".to_string()));
    };

    let mut body = serde_json::to_value(&summary)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    body["id"] = json!(summary.url);
    body["markdown"] = json!(markdown);

    Ok(Json(body))
}
