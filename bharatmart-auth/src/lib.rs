//! Authentication facade used by the backend service.
//!
//! Provides:
//! - HS256 access and refresh token issuing and verification
//! - Password hashing with Argon2id
//! - Authentication context and error types

use std::time::Duration;

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CUSTOMER: &str = "customer";

// ============================================================================
// Authentication Context
// ============================================================================

/// Captures the outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl AuthContext {
    #[inline]
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            role: Some(role.into()),
        }
    }

    /// Helper for anonymous requests.
    #[inline]
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: None,
        }
    }

    /// Indicates if the request represents an authenticated user.
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ROLE_ADMIN)
    }

    /// Whether this subject may see data owned by `owner_id`.
    #[inline]
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id.as_deref() == Some(owner_id)
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Authentication errors that can surface during request processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token format")]
    InvalidTokenFormat,
    #[error("wrong token type")]
    WrongTokenType,
    #[error("authentication subsystem is unavailable: {0}")]
    Subsystem(String),
}

/// Password-related errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
    #[error("password verification failed")]
    VerificationFailed,
    #[error("invalid hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Authenticator Trait
// ============================================================================

/// Trait for authentication backends. Implement this for production and test authenticators.
#[async_trait::async_trait]
pub trait AuthenticatorTrait: Send + Sync + 'static {
    /// Resolve a bearer token. A missing token yields an anonymous context.
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError>;
}

// ============================================================================
// Test Authenticator
// ============================================================================

/// Test-only authenticator that accepts any token as a fixed subject.
#[derive(Debug, Default, Clone)]
pub struct TestAuthenticator {
    pub context: AuthContext,
}

impl TestAuthenticator {
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            context: AuthContext::new(user_id, ROLE_ADMIN),
        }
    }

    pub fn customer(user_id: impl Into<String>) -> Self {
        Self {
            context: AuthContext::new(user_id, ROLE_CUSTOMER),
        }
    }
}

#[async_trait::async_trait]
impl AuthenticatorTrait for TestAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError> {
        match token {
            Some(t) if !t.trim().is_empty() => Ok(self.context.clone()),
            _ => Ok(AuthContext::anonymous()),
        }
    }
}

// ============================================================================
// JWT Authenticator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    typ: TokenType,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Freshly issued credentials returned by signup, login and refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// HS256 token issuer and verifier.
#[derive(Clone)]
pub struct JwtAuthenticator {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Grace period in seconds for token expiration (default: 60)
    exp_grace_seconds: u64,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("exp_grace_seconds", &self.exp_grace_seconds)
            .finish()
    }
}

impl JwtAuthenticator {
    pub fn new_hs256(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            exp_grace_seconds: 60,
        }
    }

    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    /// Set the grace period for token expiration checks.
    pub fn with_exp_grace(mut self, seconds: u64) -> Self {
        self.exp_grace_seconds = seconds;
        self
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Subsystem(e.to_string()))
    }

    fn claims(&self, user_id: &str, role: Option<&str>, typ: TokenType) -> Claims {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let ttl = match typ {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        Claims {
            sub: user_id.to_owned(),
            role: role.map(str::to_owned),
            typ,
            iat: now,
            exp: now + ttl.as_secs(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn issue_access(&self, user_id: &str, role: &str) -> Result<String, AuthError> {
        self.sign(&self.claims(user_id, Some(role), TokenType::Access))
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<String, AuthError> {
        self.sign(&self.claims(user_id, None, TokenType::Refresh))
    }

    pub fn issue_pair(&self, user_id: &str, role: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            token: self.issue_access(user_id, role)?,
            refresh_token: self.issue_refresh(user_id)?,
            expires_in: self.access_ttl.as_secs(),
        })
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false; // We handle exp manually for grace period

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_) => AuthError::InvalidTokenFormat,
            _ => AuthError::AuthenticationFailed,
        })?;
        let claims = data.claims;

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if claims.exp < now.saturating_sub(self.exp_grace_seconds) {
            return Err(AuthError::TokenExpired);
        }
        if claims.typ != expected {
            debug!(expected = ?expected, got = ?claims.typ, "token type mismatch");
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Validate a refresh token and return the user id it was issued to.
    pub fn verify_refresh(&self, token: &str) -> Result<String, AuthError> {
        self.verify(strip_bearer(token), TokenType::Refresh)
            .map(|c| c.sub)
    }
}

/// Strip the "Bearer " prefix from a token if present.
#[inline]
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    if token.len() > 7 && token[..7].eq_ignore_ascii_case("bearer ") {
        token[7..].trim_start()
    } else {
        token
    }
}

#[async_trait::async_trait]
impl AuthenticatorTrait for JwtAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => strip_bearer(t),
            _ => return Ok(AuthContext::anonymous()),
        };
        let claims = self.verify(token, TokenType::Access)?;
        Ok(AuthContext {
            user_id: Some(claims.sub),
            role: Some(claims.role.unwrap_or_else(|| ROLE_CUSTOMER.to_owned())),
        })
    }
}

// ============================================================================
// Password Hashing
// ============================================================================

/// Password hasher using Argon2id (the recommended variant for password hashing).
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    m_cost: u32,
    /// Time cost / iterations (default: 2)
    t_cost: u32,
    /// Parallelism factor (default: 1)
    p_cost: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            m_cost: 19456, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure memory cost in KiB.
    pub fn with_memory_cost(mut self, kib: u32) -> Self {
        self.m_cost = kib;
        self
    }

    /// Configure time cost (iterations).
    pub fn with_time_cost(mut self, iterations: u32) -> Self {
        self.t_cost = iterations;
        self
    }

    fn argon2(&self) -> Result<Argon2<'_>, PasswordError> {
        let params = argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, None)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        ))
    }

    /// Hash a password, returning the PHC-format hash string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored PHC-format hash.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<(), PasswordError> {
        let parsed =
            PasswordHash::new(stored_hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        self.argon2()?
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| PasswordError::VerificationFailed)
    }

    /// Verify against a user's hash, or burn an equivalent amount of work
    /// and fail when there is no such user, so both cases look alike.
    pub fn verify_user(&self, password: &str, stored_hash: Option<&str>) -> Result<(), PasswordError> {
        match stored_hash {
            Some(hash) => self.verify(password, hash),
            None => {
                let _ = self.hash(password);
                Err(PasswordError::VerificationFailed)
            }
        }
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Hash a password using default Argon2id parameters.
#[inline]
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Argon2Hasher::new().hash(password)
}

/// Verify a password against a stored hash using default parameters.
#[inline]
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), PasswordError> {
    Argon2Hasher::new().verify(password, stored_hash)
}

// ============================================================================
// Tests
// ============================================================================
