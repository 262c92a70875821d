//! Database layer
//!
//! This module provides the relational store behind accounts, sessions and
//! todos. It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL
//!
//! The driver is selected by configuration; repositories reach the concrete
//! sqlx pool through the [`DatabasePool`] trait.
//!
//! # Usage
//!
//! ```ignore
//! use todo_backend::config::DatabaseConfig;
//! use todo_backend::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether an error chain bottoms out in a unique-constraint violation.
///
/// Repositories return `anyhow` errors with context attached; this looks
/// through the context for the underlying sqlx database error.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}
