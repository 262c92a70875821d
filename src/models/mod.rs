//! Data models
//!
//! Domain records shared by the repositories, services and API layer:
//! users, sessions and todos.

mod session;
mod todo;
mod user;

pub use session::Session;
pub use todo::{Todo, TodoListParams, TodoPage};
pub use user::User;
