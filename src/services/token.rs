//! Bearer token codec
//!
//! Issues HS256-signed JWTs binding a subject id to an issuance instant and
//! an expiry. Request-time validity is decided by the session store, not by
//! the signature; [`TokenCodec::decode`] exists for offline checks.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

/// Token codec errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Token claim `{0}` is malformed")]
    MalformedClaim(&'static str),

    #[error("Token expiry is out of range")]
    ExpiryOutOfRange,
}

/// JWT claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Issued at, seconds since epoch
    pub iat: i64,
    /// Expires at, seconds since epoch
    pub exp: i64,
    /// Session id; makes two tokens minted in the same second differ
    pub jti: String,
}

impl Claims {
    pub fn subject(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::MalformedClaim("sub"))
    }

    pub fn session_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.jti).map_err(|_| TokenError::MalformedClaim("jti"))
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(TokenError::MalformedClaim("exp"))
    }
}

/// A freshly minted token together with the session it belongs to
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub session_id: Uuid,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.secret_key, config.token_ttl())
    }

    /// Lifetime given to every issued token
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject`, valid from now for the configured TTL.
    pub fn issue(&self, subject: Uuid) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if the current instant were `now`.
    pub fn issue_at(&self, subject: Uuid, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let session_id = Uuid::now_v7();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: session_id.to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            session_id,
            token,
            issued_at: now,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", Duration::hours(72))
    }

    #[test]
    fn test_issue_and_decode() {
        let codec = codec();
        let subject = Uuid::now_v7();
        let now = Utc::now();

        let issued = codec.issue_at(subject, now).expect("Failed to issue token");
        assert!(!issued.token.is_empty());
        assert_eq!(issued.expires_at, now + Duration::hours(72));

        let claims = codec.decode(&issued.token).expect("Failed to decode token");
        assert_eq!(claims.subject().unwrap(), subject);
        assert_eq!(claims.session_id().unwrap(), issued.session_id);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.expires_at().unwrap().timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let codec = TokenCodec::new("test-secret", Duration::days(3650));
        let near_end_of_time = Utc.with_ymd_and_hms(262_140, 1, 1, 0, 0, 0).unwrap();

        let result = codec.issue_at(Uuid::now_v7(), near_end_of_time);
        assert!(matches!(result, Err(TokenError::ExpiryOutOfRange)));
    }

    #[test]
    fn test_tokens_in_same_instant_differ() {
        let codec = codec();
        let subject = Uuid::now_v7();
        let now = Utc::now();

        let a = codec.issue_at(subject, now).unwrap();
        let b = codec.issue_at(subject, now).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_decode_rejects_other_secret() {
        let issued = codec().issue(Uuid::now_v7()).unwrap();
        let other = TokenCodec::new("another-secret", Duration::hours(72));

        match other.decode(&issued.token) {
            Err(TokenError::Invalid(e)) => {
                assert!(matches!(e.kind(), ErrorKind::InvalidSignature))
            }
            result => panic!("expected invalid signature, got {:?}", result),
        }
    }

    #[test]
    fn test_decode_rejects_tampered_token() {
        let issued = codec().issue(Uuid::now_v7()).unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        parts[2] = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let tampered = parts.join(".");

        assert!(codec().decode(&tampered).is_err());
        assert!(codec().decode("not-a-jwt").is_err());
    }

    #[test]
    fn test_decode_rejects_expired() {
        let codec = TokenCodec::new("test-secret", Duration::hours(1));
        let issued = codec
            .issue_at(Uuid::now_v7(), Utc::now() - Duration::hours(2))
            .unwrap();

        match codec.decode(&issued.token) {
            Err(TokenError::Invalid(e)) => {
                assert!(matches!(e.kind(), ErrorKind::ExpiredSignature))
            }
            result => panic!("expected expired signature, got {:?}", result),
        }
    }

    #[test]
    fn test_debug_hides_keys() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-secret"));
    }
}
