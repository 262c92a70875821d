//! Todo repository
//!
//! Database operations for todos. Every query is scoped by owner: a todo that
//! belongs to another user behaves exactly like a missing one.

use crate::config::DatabaseDriver;
use crate::db::repositories::{mysql_pool, parse_id, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::Todo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Todo repository trait
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Create a new todo
    async fn create(&self, todo: &Todo) -> Result<Todo>;

    /// Get one of `user_id`'s todos by id
    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>>;

    /// Count a user's todos, optionally filtered by completion
    async fn count_by_user(&self, user_id: Uuid, completed: Option<bool>) -> Result<i64>;

    /// List a user's todos, newest first
    async fn list_by_user(
        &self,
        user_id: Uuid,
        completed: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Todo>>;

    /// Replace the title. Returns the updated todo, or `None` if not found.
    async fn update_title(&self, user_id: Uuid, id: Uuid, title: &str) -> Result<Option<Todo>>;

    /// Flip the completed flag. Returns the updated todo, or `None` if not found.
    async fn toggle_completed(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>>;

    /// Delete a todo. Returns whether a row was removed.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
}

/// SQLx-based todo repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTodoRepository {
    pool: DynDatabasePool,
}

impl SqlxTodoRepository {
    /// Create a new SQLx todo repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TodoRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TodoRepository for SqlxTodoRepository {
    async fn create(&self, todo: &Todo) -> Result<Todo> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_todo_sqlite(sqlite_pool(self.pool.as_ref())?, todo).await,
            DatabaseDriver::Mysql => create_todo_mysql(mysql_pool(self.pool.as_ref())?, todo).await,
        }
    }

    async fn get_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_todo_sqlite(sqlite_pool(self.pool.as_ref())?, user_id, id).await
            }
            DatabaseDriver::Mysql => {
                get_todo_mysql(mysql_pool(self.pool.as_ref())?, user_id, id).await
            }
        }
    }

    async fn count_by_user(&self, user_id: Uuid, completed: Option<bool>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_todos_sqlite(sqlite_pool(self.pool.as_ref())?, user_id, completed).await
            }
            DatabaseDriver::Mysql => {
                count_todos_mysql(mysql_pool(self.pool.as_ref())?, user_id, completed).await
            }
        }
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        completed: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Todo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(self.pool.as_ref())?;
                list_todos_sqlite(pool, user_id, completed, limit, offset).await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(self.pool.as_ref())?;
                list_todos_mysql(pool, user_id, completed, limit, offset).await
            }
        }
    }

    async fn update_title(&self, user_id: Uuid, id: Uuid, title: &str) -> Result<Option<Todo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(self.pool.as_ref())?;
                update_todo_title_sqlite(pool, user_id, id, title).await?;
                get_todo_sqlite(pool, user_id, id).await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(self.pool.as_ref())?;
                update_todo_title_mysql(pool, user_id, id, title).await?;
                get_todo_mysql(pool, user_id, id).await
            }
        }
    }

    async fn toggle_completed(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(self.pool.as_ref())?;
                toggle_todo_sqlite(pool, user_id, id).await?;
                get_todo_sqlite(pool, user_id, id).await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(self.pool.as_ref())?;
                toggle_todo_mysql(pool, user_id, id).await?;
                get_todo_mysql(pool, user_id, id).await
            }
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_todo_sqlite(sqlite_pool(self.pool.as_ref())?, user_id, id).await
            }
            DatabaseDriver::Mysql => {
                delete_todo_mysql(mysql_pool(self.pool.as_ref())?, user_id, id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_todo_sqlite(pool: &SqlitePool, todo: &Todo) -> Result<Todo> {
    sqlx::query(
        r#"
        INSERT INTO todos (id, user_id, title, completed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(todo.id.to_string())
    .bind(todo.user_id.to_string())
    .bind(&todo.title)
    .bind(todo.completed)
    .bind(todo.created_at)
    .bind(todo.updated_at)
    .execute(pool)
    .await
    .context("Failed to create todo")?;

    Ok(todo.clone())
}

async fn get_todo_sqlite(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, title, completed, created_at, updated_at
        FROM todos
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get todo by ID")?;

    row.as_ref().map(row_to_todo_sqlite).transpose()
}

async fn count_todos_sqlite(
    pool: &SqlitePool,
    user_id: Uuid,
    completed: Option<bool>,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM todos
        WHERE user_id = ? AND (? IS NULL OR completed = ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(completed)
    .bind(completed)
    .fetch_one(pool)
    .await
    .context("Failed to count todos")?;

    Ok(row.try_get("count")?)
}

async fn list_todos_sqlite(
    pool: &SqlitePool,
    user_id: Uuid,
    completed: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Todo>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, title, completed, created_at, updated_at
        FROM todos
        WHERE user_id = ? AND (? IS NULL OR completed = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(completed)
    .bind(completed)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list todos")?;

    rows.iter().map(row_to_todo_sqlite).collect()
}

async fn update_todo_title_sqlite(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
    title: &str,
) -> Result<()> {
    sqlx::query("UPDATE todos SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(title)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await
        .context("Failed to update todo title")?;

    Ok(())
}

async fn toggle_todo_sqlite(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE todos SET completed = NOT completed, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(Utc::now())
    .bind(id.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await
    .context("Failed to toggle todo")?;

    Ok(())
}

async fn delete_todo_sqlite(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete todo")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_todo_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Todo> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;

    Ok(Todo {
        id: parse_id(&id, "todos.id")?,
        user_id: parse_id(&user_id, "todos.user_id")?,
        title: row.try_get("title")?,
        completed: row.try_get("completed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_todo_mysql(pool: &MySqlPool, todo: &Todo) -> Result<Todo> {
    sqlx::query(
        r#"
        INSERT INTO todos (id, user_id, title, completed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(todo.id.to_string())
    .bind(todo.user_id.to_string())
    .bind(&todo.title)
    .bind(todo.completed)
    .bind(todo.created_at)
    .bind(todo.updated_at)
    .execute(pool)
    .await
    .context("Failed to create todo")?;

    Ok(todo.clone())
}

async fn get_todo_mysql(pool: &MySqlPool, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, title, completed, created_at, updated_at
        FROM todos
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get todo by ID")?;

    row.as_ref().map(row_to_todo_mysql).transpose()
}

async fn count_todos_mysql(pool: &MySqlPool, user_id: Uuid, completed: Option<bool>) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) as count
        FROM todos
        WHERE user_id = ? AND (? IS NULL OR completed = ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(completed)
    .bind(completed)
    .fetch_one(pool)
    .await
    .context("Failed to count todos")?;

    Ok(row.try_get("count")?)
}

async fn list_todos_mysql(
    pool: &MySqlPool,
    user_id: Uuid,
    completed: Option<bool>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Todo>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, title, completed, created_at, updated_at
        FROM todos
        WHERE user_id = ? AND (? IS NULL OR completed = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(completed)
    .bind(completed)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list todos")?;

    rows.iter().map(row_to_todo_mysql).collect()
}

async fn update_todo_title_mysql(
    pool: &MySqlPool,
    user_id: Uuid,
    id: Uuid,
    title: &str,
) -> Result<()> {
    sqlx::query("UPDATE todos SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(title)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await
        .context("Failed to update todo title")?;

    Ok(())
}

async fn toggle_todo_mysql(pool: &MySqlPool, user_id: Uuid, id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE todos SET completed = NOT completed, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(Utc::now())
    .bind(id.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await
    .context("Failed to toggle todo")?;

    Ok(())
}

async fn delete_todo_mysql(pool: &MySqlPool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete todo")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_todo_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Todo> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;

    Ok(Todo {
        id: parse_id(&id, "todos.id")?,
        user_id: parse_id(&user_id, "todos.user_id")?,
        title: row.try_get("title")?,
        completed: row.try_get("completed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTodoRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTodoRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, email: &str) -> Uuid {
        let user = User::new("Test".to_string(), email.to_string(), "hash".to_string(), None);
        SqlxUserRepository::new(pool.clone())
            .create(&user)
            .await
            .expect("Failed to create test user");
        user.id
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "a@x.com").await;

        let todo = Todo::new(user_id, "Buy milk".to_string());
        repo.create(&todo).await.expect("Failed to create todo");

        let found = repo.get_by_id(user_id, todo.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Buy milk");
        assert!(!found.completed);
    }

    #[tokio::test]
    async fn test_get_scoped_to_owner() {
        let (pool, repo) = setup_test_repo().await;
        let owner = create_test_user(&pool, "a@x.com").await;
        let stranger = create_test_user(&pool, "b@x.com").await;

        let todo = Todo::new(owner, "Private".to_string());
        repo.create(&todo).await.unwrap();

        assert!(repo.get_by_id(stranger, todo.id).await.unwrap().is_none());
        assert!(repo.update_title(stranger, todo.id, "Hijacked").await.unwrap().is_none());
        assert!(repo.toggle_completed(stranger, todo.id).await.unwrap().is_none());
        assert!(!repo.delete(stranger, todo.id).await.unwrap());

        let untouched = repo.get_by_id(owner, todo.id).await.unwrap().unwrap();
        assert_eq!(untouched.title, "Private");
        assert!(!untouched.completed);
    }

    #[tokio::test]
    async fn test_count_and_list_with_filter() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "a@x.com").await;
        let base = Utc::now();

        for i in 0..5 {
            let mut todo = Todo::new(user_id, format!("Todo {}", i));
            todo.created_at = base + Duration::seconds(i);
            todo.completed = i % 2 == 0;
            repo.create(&todo).await.unwrap();
        }

        assert_eq!(repo.count_by_user(user_id, None).await.unwrap(), 5);
        assert_eq!(repo.count_by_user(user_id, Some(true)).await.unwrap(), 3);
        assert_eq!(repo.count_by_user(user_id, Some(false)).await.unwrap(), 2);

        let page = repo.list_by_user(user_id, None, 2, 0).await.unwrap();
        let titles: Vec<_> = page.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Todo 4", "Todo 3"]);

        let last = repo.list_by_user(user_id, None, 2, 4).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].title, "Todo 0");

        let open = repo.list_by_user(user_id, Some(false), 10, 0).await.unwrap();
        assert!(open.iter().all(|t| !t.completed));
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn test_update_title() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "a@x.com").await;

        let todo = Todo::new(user_id, "Draft".to_string());
        repo.create(&todo).await.unwrap();

        let updated = repo
            .update_title(user_id, todo.id, "Final")
            .await
            .unwrap()
            .expect("Todo should exist");
        assert_eq!(updated.title, "Final");
        assert!(updated.updated_at >= todo.updated_at);
    }

    #[tokio::test]
    async fn test_toggle_completed_flips_both_ways() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "a@x.com").await;

        let todo = Todo::new(user_id, "Flip me".to_string());
        repo.create(&todo).await.unwrap();

        let done = repo.toggle_completed(user_id, todo.id).await.unwrap().unwrap();
        assert!(done.completed);
        let reopened = repo.toggle_completed(user_id, todo.id).await.unwrap().unwrap();
        assert!(!reopened.completed);
    }

    #[tokio::test]
    async fn test_delete() {
        let (pool, repo) = setup_test_repo().await;
        let user_id = create_test_user(&pool, "a@x.com").await;

        let todo = Todo::new(user_id, "Gone soon".to_string());
        repo.create(&todo).await.unwrap();

        assert!(repo.delete(user_id, todo.id).await.unwrap());
        assert!(!repo.delete(user_id, todo.id).await.unwrap());
        assert!(repo.get_by_id(user_id, todo.id).await.unwrap().is_none());
    }
}
