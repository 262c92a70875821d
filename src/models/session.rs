//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server-held record proving that a bearer token is currently valid.
///
/// The token string never changes once issued; a session only ends by
/// having its row deleted (logout, or cleanup after expiry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Signed bearer token (unique)
    #[serde(skip_serializing)]
    pub token: String,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is dead at `now`.
    ///
    /// A session is live only while `now` is strictly before its expiry; an
    /// expiry equal to `now` already counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
