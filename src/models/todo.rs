//! Todo model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single todo item owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Create an open todo for `user_id`
    pub fn new(user_id: Uuid, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            title,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing parameters after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoListParams {
    /// 1-indexed page
    pub page: i64,
    /// Items per page
    pub limit: i64,
    /// Restrict to completed / open todos
    pub completed: Option<bool>,
}

/// One page of todos
#[derive(Debug, Clone)]
pub struct TodoPage {
    pub items: Vec<Todo>,
    pub total_items: i64,
    pub total_pages: i64,
    pub page: i64,
    pub limit: i64,
}
