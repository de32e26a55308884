pub mod documents;
pub mod posts;
pub mod search;

use axum::http::StatusCode;

use crate::domain::search::SearchError;

/// Map a domain error onto a response status.
///
/// Genuine unavailability (no embedding channel, store unreachable) is the
/// only thing surfaced as a failure; not-found conditions never reach here.
pub(crate) fn error_response(error: SearchError) -> (StatusCode, String) {
    let status = match error {
        SearchError::ConfigError(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}
