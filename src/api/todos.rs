//! Todo API endpoints
//!
//! All routes are protected; the owner is always the resolved caller.
//! - POST /api/v1/todos - Create a todo
//! - GET /api/v1/todos - List todos (paginated, optional `completed` filter)
//! - PUT /api/v1/todos/{id} - Update the title
//! - PATCH /api/v1/todos/{id}/complete - Toggle completion
//! - DELETE /api/v1/todos/{id} - Delete a todo

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::common::ListTodosQuery;
use crate::api::middleware::{ApiError, AppState, CurrentUser};
use crate::api::responses::{TodoListResponse, TodoResponse};

/// Request body for creating or renaming a todo
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TodoTitleRequest {
    pub title: String,
}

/// Build the todo router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .route("/todos/{id}/complete", patch(toggle_todo))
}

/// POST /api/v1/todos
async fn create_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<TodoTitleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;

    let todo = state
        .todo_service
        .create(current.user.id, &body.title)
        .await?;

    Ok((StatusCode::CREATED, Json(TodoResponse::from(todo))))
}

/// GET /api/v1/todos
async fn list_todos(
    State(state): State<AppState>,
    current: CurrentUser,
    query: Result<Query<ListTodosQuery>, QueryRejection>,
) -> Result<Json<TodoListResponse>, ApiError> {
    let Query(query) = query?;

    let page = state
        .todo_service
        .list(current.user.id, query.into())
        .await?;

    Ok(Json(page.into()))
}

/// PUT /api/v1/todos/{id}
async fn update_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TodoTitleRequest>, JsonRejection>,
) -> Result<Json<TodoResponse>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;

    let todo = state
        .todo_service
        .update_title(current.user.id, id, &body.title)
        .await?;

    Ok(Json(todo.into()))
}

/// PATCH /api/v1/todos/{id}/complete
async fn toggle_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TodoResponse>, ApiError> {
    let Path(id) = id?;

    let todo = state
        .todo_service
        .toggle_completed(current.user.id, id)
        .await?;

    Ok(Json(todo.into()))
}

/// DELETE /api/v1/todos/{id}
async fn delete_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;

    state.todo_service.delete(current.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
