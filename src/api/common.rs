//! Common API utilities and shared types

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::TodoListParams;

// ============================================================================
// Query Types
// ============================================================================

/// `GET /todos` query parameters. Bounds are applied by [`TodoListParams::new`].
#[derive(Debug, Default, Deserialize)]
pub struct ListTodosQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub completed: Option<bool>,
}

impl From<ListTodosQuery> for TodoListParams {
    fn from(query: ListTodosQuery) -> Self {
        TodoListParams::new(query.page, query.limit, query.completed)
    }
}

// ============================================================================
// Extractor Rejections
// ============================================================================

// Malformed input is reported in the same `{error: {code, message}}` shape as
// every other failure instead of axum's plain-text rejection bodies.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiError::new("VALIDATION_ERROR", "Request body must be valid JSON")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected query string");
        ApiError::new("VALIDATION_ERROR", "Invalid query parameters")
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected path parameter");
        ApiError::new("NOT_FOUND", "Todo not found")
    }
}
