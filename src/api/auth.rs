//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/profile - Get current user

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, CurrentUser};
use crate::api::responses::{AuthResponse, UserResponse};
use crate::services::{LoginInput, RegisterInput};

/// Request body for user registration
///
/// Missing fields deserialize as empty and are rejected by the service
/// with a validation error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

/// Request body for user login
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/profile", get(profile))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;

    let mut input = RegisterInput::new(body.name, body.email, body.password);
    input.image = body.image.filter(|image| !image.trim().is_empty());

    let outcome = state.user_service.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new(outcome.user, outcome.session)),
    ))
}

/// POST /api/v1/auth/login - User login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(body) = body?;

    let outcome = state
        .user_service
        .login(LoginInput::new(body.email, body.password))
        .await?;

    Ok(Json(AuthResponse::new(outcome.user, outcome.session)))
}

/// POST /api/v1/auth/logout - Delete the session behind the presented token
async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.user_service.logout(current.session.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/profile - Get current user
async fn profile(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}
