//! Service error taxonomy
//!
//! Authentication, account and todo failures all cross into the API layer
//! as a [`ServiceError`].
//! Client-caused kinds are never logged as server faults; store and
//! consistency faults are logged where they are detected.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authorization header is missing")]
    MissingCredential,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired. Please login again")]
    Expired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Unknown email on login. Rendered exactly like `InvalidCredentials`.
    #[error("Invalid email or password")]
    SubjectNotFound,

    #[error("Email already registered")]
    Conflict,

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Too many failed login attempts. Please try again later")]
    RateLimited,

    #[error("Store operation `{op}` failed")]
    Store {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Session {session_id} has no owner {user_id}")]
    DataConsistency { session_id: Uuid, user_id: Uuid },

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    /// Whether the caller is at fault (4xx) rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Store { .. } | Self::DataConsistency { .. } | Self::Internal(_)
        )
    }
}

/// Run one store round-trip bounded by `timeout`.
///
/// Both a store error and an elapsed timeout become [`ServiceError::Store`],
/// logged with the operation name only.
pub async fn store_call<T, F>(op: &'static str, timeout: Duration, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => {
            tracing::error!(op, "Store operation failed: {:#}", source);
            Err(ServiceError::Store { op, source })
        }
        Err(_) => {
            tracing::error!(op, timeout_ms = timeout.as_millis() as u64, "Store operation timed out");
            Err(ServiceError::Store {
                op,
                source: anyhow::anyhow!("timed out after {:?}", timeout),
            })
        }
    }
}
