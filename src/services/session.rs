//! Session validation and identity resolution
//!
//! [`SessionValidator`] turns the raw `Authorization` header of a request
//! into a live [`Session`], in a fixed order that short-circuits on the
//! first failure:
//!
//! 1. no header: [`ServiceError::MissingCredential`]
//! 2. anything but `Bearer <token>`: [`ServiceError::InvalidFormat`]
//! 3. token unknown to the store: [`ServiceError::InvalidToken`]
//! 4. session past its expiry: the row is deleted (best effort) and the
//!    request fails with [`ServiceError::Expired`]
//!
//! A store failure at step 3 is an infrastructure fault
//! ([`ServiceError::Store`]), never an authentication failure.
//!
//! [`IdentityResolver`] then loads the session's owner.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::error::{store_call, ServiceError};

/// The only accepted authorization scheme (case-sensitive)
pub const BEARER_SCHEME: &str = "Bearer";

/// Split an `Authorization` header value into its bearer token.
///
/// The value must consist of exactly two whitespace-separated parts, the
/// first being `Bearer`.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, ServiceError> {
    let raw = header.ok_or(ServiceError::MissingCredential)?;

    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) => Ok(token),
        _ => Err(ServiceError::InvalidFormat),
    }
}

/// Decides whether a presented credential maps to a live session.
pub struct SessionValidator {
    sessions: Arc<dyn SessionRepository>,
    store_timeout: Duration,
}

impl SessionValidator {
    pub fn new(sessions: Arc<dyn SessionRepository>, store_timeout: Duration) -> Self {
        Self {
            sessions,
            store_timeout,
        }
    }

    /// Validate the raw `Authorization` header value.
    pub async fn validate(&self, header: Option<&str>) -> Result<Session, ServiceError> {
        let token = parse_bearer(header)?;
        self.validate_token(token).await
    }

    /// Validate a bare token against the store.
    pub async fn validate_token(&self, token: &str) -> Result<Session, ServiceError> {
        self.validate_token_at(token, Utc::now()).await
    }

    async fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, ServiceError> {
        let session = store_call(
            "find_session_by_token",
            self.store_timeout,
            self.sessions.find_by_token(token),
        )
        .await?
        .ok_or_else(|| {
            tracing::debug!("Rejected bearer token unknown to the session store");
            ServiceError::InvalidToken
        })?;

        if session.is_expired_at(now) {
            tracing::debug!(session_id = %session.id, "Rejected expired session");
            self.discard_expired(&session).await;
            return Err(ServiceError::Expired);
        }

        Ok(session)
    }

    /// Cleanup-on-read. The request is rejected whether or not this succeeds.
    async fn discard_expired(&self, session: &Session) {
        let delete = self.sessions.delete_by_id(session.id);
        match tokio::time::timeout(self.store_timeout, delete).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session.id, "Failed to delete expired session: {:#}", e)
            }
            Err(_) => {
                tracing::warn!(session_id = %session.id, "Timed out deleting expired session")
            }
        }
    }
}

/// Loads the owner of a validated session.
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    store_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, store_timeout: Duration) -> Self {
        Self {
            users,
            store_timeout,
        }
    }

    /// Resolve the session's owner.
    ///
    /// A live session whose owner row is gone means the store is corrupt,
    /// so this is reported as [`ServiceError::DataConsistency`], not as a
    /// client error.
    pub async fn resolve(&self, session: &Session) -> Result<User, ServiceError> {
        let owner = store_call(
            "get_user_by_id",
            self.store_timeout,
            self.users.get_by_id(session.user_id),
        )
        .await?;

        owner.ok_or_else(|| {
            tracing::error!(
                session_id = %session.id,
                user_id = %session.user_id,
                "Live session references a missing user"
            );
            ServiceError::DataConsistency {
                session_id: session.id,
                user_id: session.user_id,
            }
        })
    }
}
