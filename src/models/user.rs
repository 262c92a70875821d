//! User model
//!
//! The authenticated principal. A user owns todos and any number of
//! sessions; the user row itself carries no session reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User entity representing a registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique, time-ordered identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Email address (unique, case-sensitive as stored)
    pub email: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional profile image reference
    pub image: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with a fresh id.
    ///
    /// Note: the password must already be hashed; see
    /// `services::password::hash_password()`.
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        image: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name,
            email,
            password_hash,
            image,
            created_at: now,
            updated_at: now,
        }
    }
}
