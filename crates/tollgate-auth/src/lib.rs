//! # tollgate-auth
//!
//! OAuth 2.0 authorization-code grant with PKCE and the lifecycle of the
//! access tokens it produces.
//!
//! This crate provides:
//! - Authorization request validation and silent re-authorization
//! - Authorization code issuance and exchange with row-locked, one-shot
//!   redemption
//! - Single and bulk revocation, personal access tokens, introspection
//! - Periodic deletion of expired codes
//! - Axum handlers for the `/oauth2/*` endpoints
//!
//! ## Overview
//!
//! A grant is one stored record that starts Pending (holding the hash of
//! an authorization code) and is promoted in place to Active (holding the
//! hash of an access token) when the code is exchanged. Raw codes and
//! tokens are returned to the caller exactly once and never persisted.
//!
//! ## Modules
//!
//! - [`config`] - Authorization configuration
//! - [`crypto`] - Secret generation and hashing
//! - [`error`] - Error taxonomy
//! - [`oauth`] - Authorize and token flows
//! - [`token`] - Revocation, reaping, PATs, system apps, introspection
//! - [`storage`] - Storage traits and the in-memory backend
//! - [`types`] - Domain types
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, OAuthConfig};
pub use error::{AuthError, ClientError, ErrorCategory, GrantError};
pub use http::{AuthState, IdentityVerifier, TrustedHeaderVerifier, oauth_router};
pub use storage::{ApplicationRegistry, MemoryStorage, PendingGrantLock, TokenStore};
pub use types::{
    Application, ApplicationId, Grant, GrantId, GrantState, Scope, ScopeSet, UserId,
};

/// Type alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tollgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError, OAuthConfig};
    pub use crate::crypto::{RandomSecretGenerator, SecretGenerator, SecretHasher, Sha256Hasher};
    pub use crate::error::{AuthError, ClientError, ErrorCategory, GrantError};
    pub use crate::http::{AuthState, IdentityVerifier, TrustedHeaderVerifier, oauth_router};
    pub use crate::oauth::{
        AuthorizationRequest, AuthorizationService, AuthorizeMode, AuthorizeOutcome,
        CodeDelivery, CodeExchanger, ExchangeRequest, PkceChallenge, PkceMethod, TokenResponse,
    };
    pub use crate::storage::{ApplicationRegistry, MemoryStorage, PendingGrantLock, TokenStore};
    pub use crate::token::{
        ExpiredCodeReaper, IssuedToken, PatService, RevocationService, SystemApp,
        SystemAppRegistry, SystemTokenService, TokenInfo, TokenLookup,
    };
    pub use crate::types::{
        Application, ApplicationId, Grant, GrantId, GrantState, Scope, ScopeSet, UserId,
    };
}
