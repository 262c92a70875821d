//! Rate limiter for login attempts
//!
//! Throttles brute force attempts against a single account: once an email
//! has collected `max_attempts` failed logins inside the sliding window,
//! further logins for it are refused until old failures age out.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;

/// Failed-login rate limiter keyed by email (case-insensitive)
pub struct LoginRateLimiter {
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    /// Create a new rate limiter
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_attempts, config.window())
    }

    /// Check if the email has used up its failed attempts
    pub async fn is_limited(&self, email: &str) -> bool {
        self.is_limited_at(email, Utc::now()).await
    }

    async fn is_limited_at(&self, email: &str, now: DateTime<Utc>) -> bool {
        let key = email.to_lowercase();
        let cutoff = now - self.window;
        let mut attempts = self.attempts.write().await;

        let Some(times) = attempts.get_mut(&key) else {
            return false;
        };

        // Remove old attempts
        times.retain(|time| *time > cutoff);
        if times.is_empty() {
            attempts.remove(&key);
            return false;
        }

        times.len() >= self.max_attempts
    }

    /// Record a failed login attempt
    pub async fn record_failure(&self, email: &str) {
        self.record_failure_at(email, Utc::now()).await
    }

    async fn record_failure_at(&self, email: &str, at: DateTime<Utc>) {
        let cutoff = at - self.window;
        let mut attempts = self.attempts.write().await;

        // Every failure may add a key, so every failure also sweeps stale ones
        prune(&mut attempts, cutoff);
        attempts.entry(email.to_lowercase()).or_default().push(at);
    }

    /// Drop attempts that have left the window, and emails with none left
    pub async fn cleanup(&self) {
        self.cleanup_at(Utc::now()).await
    }

    async fn cleanup_at(&self, now: DateTime<Utc>) {
        let mut attempts = self.attempts.write().await;
        prune(&mut attempts, now - self.window);
    }

    #[cfg(test)]
    async fn tracked_emails(&self) -> usize {
        self.attempts.read().await.len()
    }

    /// Clear failed attempts (on successful login)
    pub async fn clear(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.remove(&email.to_lowercase());
    }
}

fn prune(attempts: &mut HashMap<String, Vec<DateTime<Utc>>>, cutoff: DateTime<Utc>) {
    attempts.retain(|_, times| {
        times.retain(|time| *time > cutoff);
        !times.is_empty()
    });
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
