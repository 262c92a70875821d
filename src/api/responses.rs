//! Shared API response types
//!
//! Response bodies are decoupled from the domain models so that storage
//! fields (password digests, raw session rows) never reach the wire.

use serde::{Deserialize, Serialize};

use crate::models::{Session, Todo, TodoPage, User};

// ============================================================================
// Account Response Types
// ============================================================================

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            image: user.image,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Response for successful registration or login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: String,
}

impl AuthResponse {
    pub fn new(user: User, session: Session) -> Self {
        Self {
            user: user.into(),
            token: session.token,
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Todo Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TodoResponse {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id.to_string(),
            title: todo.title,
            completed: todo.completed,
            created_at: todo.created_at.to_rfc3339(),
            updated_at: todo.updated_at.to_rfc3339(),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// Paginated todo list response
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoListResponse {
    pub items: Vec<TodoResponse>,
    pub pagination: PaginationMeta,
}

impl From<TodoPage> for TodoListResponse {
    fn from(page: TodoPage) -> Self {
        Self {
            items: page.items.into_iter().map(TodoResponse::from).collect(),
            pagination: PaginationMeta {
                page: page.page,
                limit: page.limit,
                total_items: page.total_items,
                total_pages: page.total_pages,
            },
        }
    }
}

// ============================================================================
// Misc
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
