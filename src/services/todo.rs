//! Todo service
//!
//! CRUD over the authenticated user's todos. Callers pass the owner id taken
//! from the resolved request identity; this service never sees tokens.

use crate::db::repositories::TodoRepository;
use crate::models::{Todo, TodoListParams, TodoPage};
use crate::services::error::{store_call, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Page size used when the caller gives none (or a non-positive one)
pub const DEFAULT_LIMIT: i64 = 10;
/// Largest page size served
pub const MAX_LIMIT: i64 = 100;

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 255;

impl TodoListParams {
    /// Apply defaults and bounds to raw query values. The page is further
    /// clamped to the last page once the total is known.
    pub fn new(page: Option<i64>, limit: Option<i64>, completed: Option<bool>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        };
        let page = page.filter(|p| *p > 0).unwrap_or(1);

        Self {
            page,
            limit,
            completed,
        }
    }
}

/// Number of pages needed for `total` items
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

/// Todo service
pub struct TodoService {
    todo_repo: Arc<dyn TodoRepository>,
    store_timeout: Duration,
}

impl TodoService {
    pub fn new(todo_repo: Arc<dyn TodoRepository>, store_timeout: Duration) -> Self {
        Self {
            todo_repo,
            store_timeout,
        }
    }

    /// Create a todo owned by `user_id`
    pub async fn create(&self, user_id: Uuid, title: &str) -> Result<Todo, ServiceError> {
        let title = validate_title(title)?;
        let todo = Todo::new(user_id, title);

        store_call("create_todo", self.store_timeout, self.todo_repo.create(&todo)).await
    }

    /// One page of the user's todos, newest first.
    ///
    /// A page past the end is clamped to the last page.
    pub async fn list(&self, user_id: Uuid, params: TodoListParams) -> Result<TodoPage, ServiceError> {
        let total_items = store_call(
            "count_todos",
            self.store_timeout,
            self.todo_repo.count_by_user(user_id, params.completed),
        )
        .await?;

        let total_pages = total_pages(total_items, params.limit);
        let page = if total_pages > 0 {
            params.page.min(total_pages)
        } else {
            1
        };
        let offset = (page - 1) * params.limit;

        let items = store_call(
            "list_todos",
            self.store_timeout,
            self.todo_repo
                .list_by_user(user_id, params.completed, params.limit, offset),
        )
        .await?;

        Ok(TodoPage {
            items,
            total_items,
            total_pages,
            page,
            limit: params.limit,
        })
    }

    /// Replace a todo's title
    pub async fn update_title(&self, user_id: Uuid, id: Uuid, title: &str) -> Result<Todo, ServiceError> {
        let title = validate_title(title)?;

        store_call(
            "update_todo_title",
            self.store_timeout,
            self.todo_repo.update_title(user_id, id, &title),
        )
        .await?
        .ok_or(ServiceError::NotFound("Todo"))
    }

    /// Flip a todo between open and completed
    pub async fn toggle_completed(&self, user_id: Uuid, id: Uuid) -> Result<Todo, ServiceError> {
        store_call(
            "toggle_todo",
            self.store_timeout,
            self.todo_repo.toggle_completed(user_id, id),
        )
        .await?
        .ok_or(ServiceError::NotFound("Todo"))
    }

    /// Delete a todo
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let removed = store_call(
            "delete_todo",
            self.store_timeout,
            self.todo_repo.delete(user_id, id),
        )
        .await?;

        if removed {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Todo"))
        }
    }
}

fn validate_title(title: &str) -> Result<String, ServiceError> {
    let title = title.trim();
    let len = title.chars().count();

    if len < TITLE_MIN_CHARS || len > TITLE_MAX_CHARS {
        return Err(ServiceError::Validation(format!(
            "Title must be between {} and {} characters",
            TITLE_MIN_CHARS, TITLE_MAX_CHARS
        )));
    }

    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxTodoRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup_test_service() -> (TodoService, Uuid, Uuid) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let ann = User::new("Ann".into(), "a@x.com".into(), "hash".into(), None);
        let bob = User::new("Bob".into(), "b@x.com".into(), "hash".into(), None);
        users.create(&ann).await.unwrap();
        users.create(&bob).await.unwrap();

        let service = TodoService::new(SqlxTodoRepository::boxed(pool), Duration::from_secs(5));
        (service, ann.id, bob.id)
    }

    #[test]
    fn test_list_params_defaults_and_bounds() {
        assert_eq!(TodoListParams::new(None, None, None).page, 1);
        assert_eq!(TodoListParams::new(None, None, None).limit, DEFAULT_LIMIT);
        assert_eq!(TodoListParams::new(Some(0), Some(0), None).page, 1);
        assert_eq!(TodoListParams::new(Some(-3), Some(-1), None).limit, DEFAULT_LIMIT);
        assert_eq!(TodoListParams::new(Some(2), Some(500), None).limit, MAX_LIMIT);
        assert_eq!(TodoListParams::new(Some(2), Some(25), Some(true)).completed, Some(true));
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn test_title_validation() {
        assert!(validate_title("ab").is_err());
        assert!(validate_title("   ab   ").is_err());
        assert!(validate_title(&"x".repeat(256)).is_err());
        assert_eq!(validate_title("  Buy milk ").unwrap(), "Buy milk");
        assert!(validate_title(&"é".repeat(255)).is_ok());
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (service, ann, _bob) = setup_test_service().await;

        let todo = service.create(ann, "Buy milk").await.unwrap();
        assert_eq!(todo.user_id, ann);
        assert!(!todo.completed);

        let page = service
            .list(ann, TodoListParams::new(None, None, None))
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.items[0].id, todo.id);
    }

    #[tokio::test]
    async fn test_list_clamps_page_to_last() {
        let (service, ann, _bob) = setup_test_service().await;
        for i in 0..5 {
            service.create(ann, &format!("Todo {}", i)).await.unwrap();
        }

        let page = service
            .list(ann, TodoListParams::new(Some(9), Some(2), None))
            .await
            .unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (service, ann, _bob) = setup_test_service().await;

        let page = service
            .list(ann, TodoListParams::new(Some(4), None, None))
            .await
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_other_users_todo_is_not_found() {
        let (service, ann, bob) = setup_test_service().await;
        let todo = service.create(ann, "Ann's todo").await.unwrap();

        assert!(matches!(
            service.update_title(bob, todo.id, "Mine now").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.toggle_completed(bob, todo.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(service.delete(bob, todo.id).await, Err(ServiceError::NotFound(_))));

        let bobs = service
            .list(bob, TodoListParams::new(None, None, None))
            .await
            .unwrap();
        assert_eq!(bobs.total_items, 0);
    }

    #[tokio::test]
    async fn test_update_toggle_delete() {
        let (service, ann, _bob) = setup_test_service().await;
        let todo = service.create(ann, "Draft").await.unwrap();

        let renamed = service.update_title(ann, todo.id, "Final").await.unwrap();
        assert_eq!(renamed.title, "Final");

        let done = service.toggle_completed(ann, todo.id).await.unwrap();
        assert!(done.completed);

        let completed = service
            .list(ann, TodoListParams::new(None, None, Some(true)))
            .await
            .unwrap();
        assert_eq!(completed.total_items, 1);

        service.delete(ann, todo.id).await.unwrap();
        assert!(matches!(service.delete(ann, todo.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_title_rejected() {
        let (service, ann, _bob) = setup_test_service().await;
        assert!(matches!(service.create(ann, "ab").await, Err(ServiceError::Validation(_))));

        let todo = service.create(ann, "Valid").await.unwrap();
        assert!(matches!(
            service.update_title(ann, todo.id, "").await,
            Err(ServiceError::Validation(_))
        ));
    }
}
