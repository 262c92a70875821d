//! Session repository
//!
//! Database operations for bearer-token sessions.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! Every session row carries its owner's id; a user may hold any number of
//! sessions at once. There is no background sweep: expired rows are removed
//! by whoever observes them.

use crate::config::DatabaseDriver;
use crate::db::repositories::{mysql_pool, parse_id, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session row
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Look up a session by its token string
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// The owner's most recently created session, live or not
    async fn find_owner_session_info(&self, user_id: Uuid) -> Result<Option<Session>>;

    /// Delete a session by id. Returns whether a row was removed; a missing
    /// id is not an error.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;

    /// Delete a session by token. Same semantics as `delete_by_id`.
    async fn delete_by_token(&self, token: &str) -> Result<bool>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_session_sqlite(sqlite_pool(self.pool.as_ref())?, session).await
            }
            DatabaseDriver::Mysql => {
                create_session_mysql(mysql_pool(self.pool.as_ref())?, session).await
            }
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_session_by_token_sqlite(sqlite_pool(self.pool.as_ref())?, token).await
            }
            DatabaseDriver::Mysql => {
                find_session_by_token_mysql(mysql_pool(self.pool.as_ref())?, token).await
            }
        }
    }

    async fn find_owner_session_info(&self, user_id: Uuid) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_latest_session_sqlite(sqlite_pool(self.pool.as_ref())?, user_id).await
            }
            DatabaseDriver::Mysql => {
                find_latest_session_mysql(mysql_pool(self.pool.as_ref())?, user_id).await
            }
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_session_sqlite(sqlite_pool(self.pool.as_ref())?, id).await
            }
            DatabaseDriver::Mysql => {
                delete_session_mysql(mysql_pool(self.pool.as_ref())?, id).await
            }
        }
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_session_by_token_sqlite(sqlite_pool(self.pool.as_ref())?, token).await
            }
            DatabaseDriver::Mysql => {
                delete_session_by_token_mysql(mysql_pool(self.pool.as_ref())?, token).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, token, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(&session.token)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn find_session_by_token_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token, expires_at, created_at
        FROM sessions
        WHERE token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to find session by token")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

async fn find_latest_session_sqlite(pool: &SqlitePool, user_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token, expires_at, created_at
        FROM sessions
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to find latest session for user")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

async fn delete_session_sqlite(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_session_by_token_sqlite(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session by token")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;

    Ok(Session {
        id: parse_id(&id, "sessions.id")?,
        user_id: parse_id(&user_id, "sessions.user_id")?,
        token: row.try_get("token")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, token, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(&session.token)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn find_session_by_token_mysql(pool: &MySqlPool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token, expires_at, created_at
        FROM sessions
        WHERE token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to find session by token")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

async fn find_latest_session_mysql(pool: &MySqlPool, user_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, token, expires_at, created_at
        FROM sessions
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to find latest session for user")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

async fn delete_session_mysql(pool: &MySqlPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_session_by_token_mysql(pool: &MySqlPool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session by token")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;

    Ok(Session {
        id: parse_id(&id, "sessions.id")?,
        user_id: parse_id(&user_id, "sessions.user_id")?,
        token: row.try_get("token")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}
