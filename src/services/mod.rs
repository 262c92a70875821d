//! Services layer - Business logic
//!
//! Services sit between the API handlers and the repositories:
//! - Credential hashing and token signing
//! - Session validation and identity resolution
//! - Account lifecycle and todo CRUD
//!
//! All of them report failures as [`ServiceError`].

pub mod error;
pub mod password;
pub mod rate_limiter;
pub mod session;
pub mod todo;
pub mod token;
pub mod user;

pub use error::{store_call, ServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use session::{parse_bearer, IdentityResolver, SessionValidator};
pub use todo::TodoService;
pub use token::{Claims, IssuedToken, TokenCodec, TokenError};
pub use user::{AuthOutcome, LoginInput, RegisterInput, UserService};
