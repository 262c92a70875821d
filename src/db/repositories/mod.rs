//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity, with one query set
//! per supported driver.

pub mod session;
pub mod todo;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use todo::{SqlxTodoRepository, TodoRepository};
pub use user::{SqlxUserRepository, UserRepository};

use anyhow::{anyhow, Context, Result};
use sqlx::{MySqlPool, SqlitePool};
use uuid::Uuid;

use crate::db::DatabasePool;

/// Borrow the SQLite pool behind a pool reporting the SQLite driver
pub(crate) fn sqlite_pool(pool: &dyn DatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite()
        .ok_or_else(|| anyhow!("Pool reports SQLite driver but holds no SQLite pool"))
}

/// Borrow the MySQL pool behind a pool reporting the MySQL driver
pub(crate) fn mysql_pool(pool: &dyn DatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql()
        .ok_or_else(|| anyhow!("Pool reports MySQL driver but holds no MySQL pool"))
}

/// Ids are stored as hyphenated strings on both drivers.
pub(crate) fn parse_id(raw: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid UUID in column {}: {}", column, raw))
}
