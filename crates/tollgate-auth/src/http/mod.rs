//! Axum handlers for the OAuth 2.0 endpoints.
//!
//! # Routes
//!
//! | Method     | Path                                  | Handler                 |
//! |------------|---------------------------------------|-------------------------|
//! | GET, POST  | `/oauth2/authorize`                   | [`authorize_get`], [`authorize_post`] |
//! | POST       | `/oauth2/token`                       | [`token_handler`]       |
//! | POST       | `/oauth2/revoke`                      | [`revoke_handler`]      |
//! | POST       | `/oauth2/introspect`                  | [`introspect_handler`]  |
//! | GET        | `/.well-known/openid-configuration`   | [`openid_configuration_handler`] |

pub mod authorize;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod introspect;
pub mod revoke;
pub mod templates;
pub mod token;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::config::AuthConfig;
use crate::crypto::{RandomSecretGenerator, SecretGenerator, SecretHasher, Sha256Hasher};
use crate::oauth::{AuthorizationService, CodeExchanger};
use crate::storage::{ApplicationRegistry, TokenStore};
use crate::token::{PatService, RevocationService, SystemAppRegistry, SystemTokenService, TokenLookup};

pub use authorize::{authorize_get, authorize_post};
pub use discovery::openid_configuration_handler;
pub use error::ErrorBody;
pub use identity::{IdentityVerifier, TrustedHeaderVerifier};
pub use introspect::introspect_handler;
pub use revoke::revoke_handler;
pub use token::{parse_basic_auth, token_handler};

pub const AUTHORIZE_PATH: &str = "/oauth2/authorize";
pub const TOKEN_PATH: &str = "/oauth2/token";
pub const REVOKE_PATH: &str = "/oauth2/revoke";
pub const INTROSPECT_PATH: &str = "/oauth2/introspect";
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

// =============================================================================
// State
// =============================================================================

/// Shared state for every OAuth handler.
#[derive(Clone)]
pub struct AuthState {
    pub authorization: Arc<AuthorizationService>,
    pub exchanger: Arc<CodeExchanger>,
    pub revocation: Arc<RevocationService>,
    pub lookup: Arc<TokenLookup>,
    pub system_apps: Arc<SystemAppRegistry>,
    pub pats: Arc<PatService>,
    pub system_tokens: Arc<SystemTokenService>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub config: Arc<AuthConfig>,
}

impl AuthState {
    /// Wires every service over the given stores, hashing with SHA-256 and
    /// drawing secrets from the OS-seeded CSPRNG.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        applications: Arc<dyn ApplicationRegistry>,
        system_apps: Arc<SystemAppRegistry>,
        identity: Arc<dyn IdentityVerifier>,
        config: AuthConfig,
    ) -> Self {
        let hasher: Arc<dyn SecretHasher> = Arc::new(Sha256Hasher);
        let generator: Arc<dyn SecretGenerator> = Arc::new(RandomSecretGenerator);

        Self {
            authorization: Arc::new(AuthorizationService::new(
                applications.clone(),
                store.clone(),
                hasher.clone(),
                generator.clone(),
                &config.oauth,
            )),
            exchanger: Arc::new(CodeExchanger::new(
                store.clone(),
                applications.clone(),
                hasher.clone(),
                generator.clone(),
                config.oauth.authorization_code_timeout,
            )),
            revocation: Arc::new(RevocationService::new(
                store.clone(),
                applications.clone(),
                hasher.clone(),
            )),
            lookup: Arc::new(TokenLookup::new(
                store.clone(),
                applications,
                hasher.clone(),
            )),
            pats: Arc::new(PatService::new(
                store.clone(),
                hasher.clone(),
                generator.clone(),
                &system_apps,
                &config.oauth,
            )),
            system_tokens: Arc::new(SystemTokenService::new(
                system_apps.clone(),
                store,
                hasher,
                generator,
            )),
            system_apps,
            identity,
            config: Arc::new(config),
        }
    }
}

/// Builds the router for all OAuth endpoints.
pub fn oauth_router(state: AuthState) -> Router {
    Router::new()
        .route(AUTHORIZE_PATH, get(authorize_get).post(authorize_post))
        .route(TOKEN_PATH, post(token_handler))
        .route(REVOKE_PATH, post(revoke_handler))
        .route(INTROSPECT_PATH, post(introspect_handler))
        .route(DISCOVERY_PATH, get(openid_configuration_handler))
        .with_state(state)
}
