use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{routes::error_response, AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search))
}

#[derive(Debug, Clone, Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<usize>,
    #[serde(default)]
    distinct: bool,
}

#[instrument(name = "GET /search", skip(app_state))]
async fn search(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let results = app_state
        .search_service
        .search(&query.q, query.limit, query.distinct)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "query": query.q,
        "count": results.len(),
        "results": results,
    })))
}
