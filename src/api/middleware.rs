//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error body and its HTTP status mapping
//! - `require_auth`, which validates the bearer token and resolves the
//!   caller before any protected route runs
//! - `CurrentUser`, the typed accessor handlers use to read the caller

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{SqlxSessionRepository, SqlxTodoRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::models::{Session, User};
use crate::services::{
    ServiceError, IdentityResolver, LoginRateLimiter, SessionValidator, TodoService, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub todo_service: Arc<TodoService>,
    pub session_validator: Arc<SessionValidator>,
    pub identity_resolver: Arc<IdentityResolver>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn new(pool: DynDatabasePool, config: Arc<Config>) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let todo_repo = SqlxTodoRepository::boxed(pool.clone());
        let store_timeout = config.auth.store_timeout();

        let user_service = UserService::new(
            user_repo.clone(),
            session_repo.clone(),
            &config.auth,
            LoginRateLimiter::from_config(&config.rate_limit),
        );

        Self {
            pool,
            user_service: Arc::new(user_service),
            todo_service: Arc::new(TodoService::new(todo_repo, store_timeout)),
            session_validator: Arc::new(SessionValidator::new(session_repo, store_timeout)),
            identity_resolver: Arc::new(IdentityResolver::new(user_repo, store_timeout)),
            config,
        }
    }
}

/// The authenticated caller of a protected request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "MISSING_CREDENTIAL" | "INVALID_FORMAT" | "INVALID_TOKEN" | "TOKEN_EXPIRED"
            | "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = match &err {
            ServiceError::MissingCredential => "MISSING_CREDENTIAL",
            ServiceError::InvalidFormat => "INVALID_FORMAT",
            ServiceError::InvalidToken => "INVALID_TOKEN",
            ServiceError::Expired => "TOKEN_EXPIRED",
            ServiceError::InvalidCredentials | ServiceError::SubjectNotFound => "INVALID_CREDENTIALS",
            ServiceError::Conflict => "CONFLICT",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::RateLimited => "RATE_LIMITED",
            // Already logged where detected; never echo internals
            ServiceError::Store { .. } | ServiceError::DataConsistency { .. } | ServiceError::Internal(_) => {
                return Self::internal_error();
            }
        };

        Self::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Authentication middleware
///
/// Runs the session validator and identity resolver, then makes the caller
/// available to handlers through [`CurrentUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| ServiceError::InvalidFormat)?),
        None => None,
    };

    let session = state.session_validator.validate(authorization).await?;
    let user = state.identity_resolver.resolve(&session).await?;

    request.extensions_mut().insert(CurrentUser { user, session });
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            tracing::error!(
                path = %parts.uri.path(),
                "CurrentUser requested on a route without require_auth"
            );
            ApiError::internal_error()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_credential_errors_are_401() {
        for (err, code) in [
            (ServiceError::MissingCredential, "MISSING_CREDENTIAL"),
            (ServiceError::InvalidFormat, "INVALID_FORMAT"),
            (ServiceError::InvalidToken, "INVALID_TOKEN"),
            (ServiceError::Expired, "TOKEN_EXPIRED"),
            (ServiceError::InvalidCredentials, "INVALID_CREDENTIALS"),
            (ServiceError::SubjectNotFound, "INVALID_CREDENTIALS"),
        ] {
            let (status, body) = body_json(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"]["code"], code);
        }
    }

    #[tokio::test]
    async fn test_client_error_statuses() {
        let cases = [
            (ServiceError::Conflict, StatusCode::CONFLICT),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("Todo"), StatusCode::NOT_FOUND),
            (ServiceError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        ];
        for (err, expected) in cases {
            let (status, _) = body_json(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_server_faults_hide_details() {
        let store = ServiceError::Store {
            op: "find_session_by_token",
            source: anyhow::anyhow!("password=hunter2 connection refused"),
        };
        let (status, body) = body_json(store.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");

        let orphan = ServiceError::DataConsistency {
            session_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
        };
        let (status, body) = body_json(orphan.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_render_identically() {
        let (_, unknown) = body_json(ServiceError::SubjectNotFound.into()).await;
        let (_, wrong) = body_json(ServiceError::InvalidCredentials.into()).await;
        assert_eq!(unknown, wrong);
    }
}
