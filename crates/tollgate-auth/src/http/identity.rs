//! End-user identity for the authorize and revoke endpoints.
//!
//! Login itself (passwords, sessions, second factors) happens elsewhere.
//! This crate only asks an [`IdentityVerifier`] who is acting.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::UserId;

/// Confirms which user is acting on a request.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the acting user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` if no user is authenticated.
    async fn verify(&self, headers: &HeaderMap) -> AuthResult<UserId>;
}

/// Trusts a user id header set by an authenticating reverse proxy.
///
/// Only safe when the proxy strips the header from client requests.
#[derive(Debug, Clone)]
pub struct TrustedHeaderVerifier {
    header: HeaderName,
}

impl TrustedHeaderVerifier {
    pub const DEFAULT_HEADER: &'static str = "x-user-id";

    #[must_use]
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for TrustedHeaderVerifier {
    fn default() -> Self {
        Self::new(HeaderName::from_static(Self::DEFAULT_HEADER))
    }
}

#[async_trait]
impl IdentityVerifier for TrustedHeaderVerifier {
    async fn verify(&self, headers: &HeaderMap) -> AuthResult<UserId> {
        let raw = headers
            .get(&self.header)
            .ok_or_else(|| AuthError::unauthorized("no authenticated user"))?;

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(UserId)
            .ok_or_else(|| AuthError::unauthorized(format!("malformed {} header", self.header)))
    }
}
