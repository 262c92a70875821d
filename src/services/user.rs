//! User service
//!
//! Account lifecycle:
//! - Registration: validate, reject duplicate emails, hash, create, issue
//!   the first session
//! - Login: throttle, check credentials, issue (or reuse) a session
//! - Logout: revoke the current session
//!
//! Every store round-trip is bounded by the configured store timeout and
//! mapped into [`ServiceError`].

use crate::config::{AuthConfig, SessionPolicy};
use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::error::{store_call, ServiceError};
use crate::services::password::{hash_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::token::TokenCodec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A user together with the session that authenticates them
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub session: Session,
}

/// User service for registration and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    codec: TokenCodec,
    session_policy: SessionPolicy,
    store_timeout: Duration,
    rate_limiter: LoginRateLimiter,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        auth: &AuthConfig,
        rate_limiter: LoginRateLimiter,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            codec: TokenCodec::from_config(auth),
            session_policy: auth.session_policy,
            store_timeout: auth.store_timeout(),
            rate_limiter,
        }
    }

    /// Register a new user and open their first session.
    ///
    /// # Errors
    ///
    /// - `Validation` if a required field is empty or the email is malformed
    /// - `Conflict` if the email is already registered
    /// - `Store` / `Internal` for infrastructure failures
    pub async fn register(&self, input: RegisterInput) -> Result<AuthOutcome, ServiceError> {
        validate_register_input(&input)?;

        // Fast path only; the unique constraint on users.email is authoritative
        let existing = store_call(
            "count_users_by_email",
            self.store_timeout,
            self.user_repo.count_by_email(&input.email),
        )
        .await?;
        if existing > 0 {
            tracing::debug!("Registration rejected: email already registered");
            return Err(ServiceError::Conflict);
        }

        let password_hash = hash_password(&input.password).map_err(ServiceError::Internal)?;
        let user = User::new(input.name, input.email, password_hash, input.image);

        let user_repo = &self.user_repo;
        let created = store_call("create_user", self.store_timeout, async {
            match user_repo.create(&user).await {
                Ok(created) => Ok(Ok(created)),
                Err(e) if is_unique_violation(&e) => Ok(Err(ServiceError::Conflict)),
                Err(e) => Err(e),
            }
        })
        .await??;

        let session = match self.issue_session(created.id).await {
            Ok(session) => session,
            Err(e) => {
                // A user never outlives a failed first session
                self.discard_user(created.id).await;
                return Err(e);
            }
        };
        tracing::info!(user_id = %created.id, "User registered");

        Ok(AuthOutcome {
            user: created,
            session,
        })
    }

    /// Authenticate with email and password.
    ///
    /// An unknown email fails as `SubjectNotFound` and a wrong password as
    /// `InvalidCredentials`; both render identically to the caller.
    pub async fn login(&self, input: LoginInput) -> Result<AuthOutcome, ServiceError> {
        if input.email.trim().is_empty() {
            return Err(ServiceError::Validation("Email cannot be empty".to_string()));
        }
        if input.password.is_empty() {
            return Err(ServiceError::Validation("Password cannot be empty".to_string()));
        }

        if self.rate_limiter.is_limited(&input.email).await {
            tracing::debug!("Login throttled after repeated failures");
            return Err(ServiceError::RateLimited);
        }

        let user = store_call(
            "get_user_by_email",
            self.store_timeout,
            self.user_repo.get_by_email(&input.email),
        )
        .await?;

        let Some(user) = user else {
            self.rate_limiter.record_failure(&input.email).await;
            tracing::debug!("Login failed: unknown email");
            return Err(ServiceError::SubjectNotFound);
        };

        if !verify_password(&input.password, &user.password_hash) {
            self.rate_limiter.record_failure(&input.email).await;
            tracing::debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        self.rate_limiter.clear(&input.email).await;

        let session = match self.session_policy {
            SessionPolicy::Fresh => self.issue_session(user.id).await?,
            SessionPolicy::Reuse => self.reuse_or_issue_session(user.id).await?,
        };
        tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");

        Ok(AuthOutcome { user, session })
    }

    /// Revoke a session. Revoking an already-gone session is not an error.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), ServiceError> {
        let removed = store_call(
            "delete_session_by_id",
            self.store_timeout,
            self.session_repo.delete_by_id(session_id),
        )
        .await?;

        tracing::info!(%session_id, removed, "User logged out");
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// Mint a token and persist its session row
    async fn issue_session(&self, user_id: Uuid) -> Result<Session, ServiceError> {
        let issued = self
            .codec
            .issue(user_id)
            .map_err(|e| ServiceError::Internal(e.into()))?;

        let session = Session {
            id: issued.session_id,
            user_id,
            token: issued.token,
            expires_at: issued.expires_at,
            created_at: issued.issued_at,
        };

        store_call(
            "create_session",
            self.store_timeout,
            self.session_repo.create(&session),
        )
        .await
    }

    /// Remove a user whose first session could not be issued
    async fn discard_user(&self, user_id: Uuid) {
        let delete = self.user_repo.delete(user_id);
        match tokio::time::timeout(self.store_timeout, delete).await {
            Ok(Ok(_)) => tracing::warn!(%user_id, "Rolled back registration without a session"),
            Ok(Err(e)) => {
                tracing::error!(%user_id, "Failed to roll back registration: {:#}", e)
            }
            Err(_) => tracing::error!(%user_id, "Timed out rolling back registration"),
        }
    }

    /// Hand back the owner's latest session while it is live; otherwise
    /// drop it and issue a new one.
    async fn reuse_or_issue_session(&self, user_id: Uuid) -> Result<Session, ServiceError> {
        let latest = store_call(
            "find_owner_session_info",
            self.store_timeout,
            self.session_repo.find_owner_session_info(user_id),
        )
        .await?;

        match latest {
            Some(session) if !session.is_expired() => Ok(session),
            Some(expired) => {
                store_call(
                    "delete_session_by_id",
                    self.store_timeout,
                    self.session_repo.delete_by_id(expired.id),
                )
                .await?;
                self.issue_session(user_id).await
            }
            None => self.issue_session(user_id).await,
        }
    }
}

/// Validate registration input before touching the store
fn validate_register_input(input: &RegisterInput) -> Result<(), ServiceError> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::Validation("Name cannot be empty".to_string()));
    }

    if input.email.trim().is_empty() {
        return Err(ServiceError::Validation("Email cannot be empty".to_string()));
    }

    if input.password.is_empty() {
        return Err(ServiceError::Validation("Password cannot be empty".to_string()));
    }

    if !input.email.contains('@') {
        return Err(ServiceError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
}

impl RegisterInput {
    /// Create a new registration input
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            image: None,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::session::SessionValidator;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    struct Fixture {
        service: UserService,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    }

    fn test_auth_config(policy: SessionPolicy) -> AuthConfig {
        AuthConfig {
            secret_key: "test-secret".to_string(),
            session_policy: policy,
            ..AuthConfig::default()
        }
    }

    async fn setup_with(policy: SessionPolicy, limiter: LoginRateLimiter) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(
            users.clone(),
            sessions.clone(),
            &test_auth_config(policy),
            limiter,
        );

        Fixture {
            service,
            users,
            sessions,
        }
    }

    async fn setup_test_service() -> Fixture {
        setup_with(SessionPolicy::Fresh, LoginRateLimiter::default()).await
    }

    async fn register_ann(f: &Fixture) -> AuthOutcome {
        f.service
            .register(RegisterInput::new("Ann", "a@x.com", "secret1"))
            .await
            .expect("Failed to register")
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_returns_user_and_live_session() {
        let f = setup_test_service().await;
        let outcome = register_ann(&f).await;

        assert_eq!(outcome.user.name, "Ann");
        assert_eq!(outcome.user.email, "a@x.com");
        assert!(outcome.user.password_hash.starts_with("$argon2id$"));
        assert!(!outcome.session.token.is_empty());
        assert!(outcome.session.expires_at > Utc::now());
        assert_eq!(outcome.session.user_id, outcome.user.id);

        let stored = f.sessions.find_by_token(&outcome.session.token).await.unwrap();
        assert_eq!(stored.unwrap().id, outcome.session.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let f = setup_test_service().await;
        let first = register_ann(&f).await;

        let result = f
            .service
            .register(RegisterInput::new("Other", "a@x.com", "another1"))
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict)));

        assert_eq!(f.users.count_by_email("a@x.com").await.unwrap(), 1);
        let stored = f.users.get_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.user.id);
    }

    /// User store whose duplicate pre-check never sees existing rows, as
    /// when two registrations for one email race past it
    struct RacingUsers(Arc<dyn UserRepository>);

    #[async_trait]
    impl UserRepository for RacingUsers {
        async fn create(&self, user: &User) -> anyhow::Result<User> {
            self.0.create(user).await
        }
        async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            self.0.get_by_id(id).await
        }
        async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            self.0.get_by_email(email).await
        }
        async fn count_by_email(&self, _email: &str) -> anyhow::Result<i64> {
            Ok(0)
        }
        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            self.0.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_register_unique_constraint_reports_conflict() {
        let f = setup_test_service().await;
        let service = UserService::new(
            Arc::new(RacingUsers(f.users.clone())),
            f.sessions.clone(),
            &test_auth_config(SessionPolicy::Fresh),
            LoginRateLimiter::default(),
        );

        let first = service
            .register(RegisterInput::new("Ann", "a@x.com", "secret1"))
            .await
            .expect("Failed to register");
        let second = service
            .register(RegisterInput::new("Other", "a@x.com", "another1"))
            .await;

        assert!(matches!(second, Err(ServiceError::Conflict)));
        assert_eq!(f.users.count_by_email("a@x.com").await.unwrap(), 1);
        let stored = f.users.get_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.user.id);
    }

    /// Session store that cannot persist new sessions
    struct UnwritableSessions(Arc<dyn SessionRepository>);

    #[async_trait]
    impl SessionRepository for UnwritableSessions {
        async fn create(&self, _session: &Session) -> anyhow::Result<Session> {
            anyhow::bail!("disk full")
        }
        async fn find_by_token(&self, token: &str) -> anyhow::Result<Option<Session>> {
            self.0.find_by_token(token).await
        }
        async fn find_owner_session_info(&self, user_id: Uuid) -> anyhow::Result<Option<Session>> {
            self.0.find_owner_session_info(user_id).await
        }
        async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<bool> {
            self.0.delete_by_id(id).await
        }
        async fn delete_by_token(&self, token: &str) -> anyhow::Result<bool> {
            self.0.delete_by_token(token).await
        }
    }

    #[tokio::test]
    async fn test_register_rolls_back_user_when_session_fails() {
        let f = setup_test_service().await;
        let broken = UserService::new(
            f.users.clone(),
            Arc::new(UnwritableSessions(f.sessions.clone())),
            &test_auth_config(SessionPolicy::Fresh),
            LoginRateLimiter::default(),
        );

        let result = broken
            .register(RegisterInput::new("Ann", "a@x.com", "secret1"))
            .await;
        assert!(matches!(result, Err(ServiceError::Store { .. })));
        assert_eq!(f.users.count_by_email("a@x.com").await.unwrap(), 0);

        // A retry against a healthy store goes through
        register_ann(&f).await;
        assert_eq!(f.users.count_by_email("a@x.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_missing_fields_rejected_before_store() {
        let f = setup_test_service().await;

        for input in [
            RegisterInput::new("", "a@x.com", "secret1"),
            RegisterInput::new("Ann", "  ", "secret1"),
            RegisterInput::new("Ann", "a@x.com", ""),
            RegisterInput::new("Ann", "not-an-email", "secret1"),
        ] {
            let result = f.service.register(input).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }

        assert_eq!(f.users.count_by_email("a@x.com").await.unwrap(), 0);
    }

    // ========================================================================
    // Login tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_success_issues_fresh_session() {
        let f = setup_test_service().await;
        let registered = register_ann(&f).await;

        let outcome = f
            .service
            .login(LoginInput::new("a@x.com", "secret1"))
            .await
            .expect("Failed to login");

        assert_eq!(outcome.user.id, registered.user.id);
        assert_ne!(outcome.session.token, registered.session.token);
        assert!(!outcome.session.is_expired());

        // Both sessions stay valid
        let validator = SessionValidator::new(f.sessions.clone(), Duration::from_secs(5));
        assert!(validator.validate_token(&registered.session.token).await.is_ok());
        assert!(validator.validate_token(&outcome.session.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_creates_no_session() {
        let f = setup_test_service().await;
        let registered = register_ann(&f).await;

        let result = f.service.login(LoginInput::new("a@x.com", "wrong")).await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));

        // Only the registration session exists
        let latest = f
            .sessions
            .find_owner_session_info(registered.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, registered.session.id);
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let f = setup_test_service().await;

        let result = f.service.login(LoginInput::new("nobody@x.com", "secret1")).await;
        assert!(matches!(result, Err(ServiceError::SubjectNotFound)));
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let f = setup_test_service().await;

        let no_email = f.service.login(LoginInput::new("", "secret1")).await;
        assert!(matches!(no_email, Err(ServiceError::Validation(_))));

        let no_password = f.service.login(LoginInput::new("a@x.com", "")).await;
        assert!(matches!(no_password, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_throttled_after_failures() {
        let f = setup_with(
            SessionPolicy::Fresh,
            LoginRateLimiter::new(2, ChronoDuration::minutes(10)),
        )
        .await;
        register_ann(&f).await;

        for _ in 0..2 {
            let result = f.service.login(LoginInput::new("a@x.com", "wrong")).await;
            assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
        }

        // Even the right password is refused while throttled
        let result = f.service.login(LoginInput::new("a@x.com", "secret1")).await;
        assert!(matches!(result, Err(ServiceError::RateLimited)));
    }

    #[tokio::test]
    async fn test_successful_login_clears_failures() {
        let f = setup_with(
            SessionPolicy::Fresh,
            LoginRateLimiter::new(2, ChronoDuration::minutes(10)),
        )
        .await;
        register_ann(&f).await;

        let _ = f.service.login(LoginInput::new("a@x.com", "wrong")).await;
        f.service
            .login(LoginInput::new("a@x.com", "secret1"))
            .await
            .expect("One failure should not throttle");

        let _ = f.service.login(LoginInput::new("a@x.com", "wrong")).await;
        assert!(f.service.login(LoginInput::new("a@x.com", "secret1")).await.is_ok());
    }

    // ========================================================================
    // Session policy tests
    // ========================================================================

    #[tokio::test]
    async fn test_reuse_policy_returns_live_session() {
        let f = setup_with(SessionPolicy::Reuse, LoginRateLimiter::default()).await;
        let registered = register_ann(&f).await;

        let outcome = f
            .service
            .login(LoginInput::new("a@x.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(outcome.session.id, registered.session.id);
        assert_eq!(outcome.session.token, registered.session.token);
    }

    #[tokio::test]
    async fn test_reuse_policy_replaces_expired_session() {
        let f = setup_with(SessionPolicy::Reuse, LoginRateLimiter::default()).await;
        let registered = register_ann(&f).await;

        // Age the registration session past its expiry
        let expired = Session {
            id: Uuid::now_v7(),
            user_id: registered.user.id,
            token: "expired-token".to_string(),
            expires_at: Utc::now() - ChronoDuration::seconds(1),
            created_at: Utc::now() + ChronoDuration::seconds(1),
        };
        f.sessions.delete_by_id(registered.session.id).await.unwrap();
        f.sessions.create(&expired).await.unwrap();

        let outcome = f
            .service
            .login(LoginInput::new("a@x.com", "secret1"))
            .await
            .unwrap();

        assert_ne!(outcome.session.id, expired.id);
        assert!(!outcome.session.is_expired());
        assert!(f.sessions.find_by_token("expired-token").await.unwrap().is_none());
    }

    // ========================================================================
    // Logout tests
    // ========================================================================

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let f = setup_test_service().await;
        let registered = register_ann(&f).await;

        f.service
            .logout(registered.session.id)
            .await
            .expect("Failed to logout");

        let validator = SessionValidator::new(f.sessions.clone(), Duration::from_secs(5));
        let result = validator.validate_token(&registered.session.token).await;
        assert!(matches!(result, Err(ServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_logout_nonexistent_session_succeeds() {
        let f = setup_test_service().await;
        f.service
            .logout(Uuid::now_v7())
            .await
            .expect("Logout of unknown session should succeed");
    }
}
