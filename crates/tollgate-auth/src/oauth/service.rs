//! Authorization service.
//!
//! Ties the authorize flow together: load application, validate, look for
//! an equivalent prior grant (first touch only), then issue a code.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::crypto::{SecretGenerator, SecretHasher};
use crate::oauth::authorize::{AuthorizationRequest, AuthorizeOutcome};
use crate::oauth::issuer::AuthorizationCodeIssuer;
use crate::oauth::silent_auth::{SilentAuthChecker, SilentAuthDecision};
use crate::oauth::validator::AuthorizationRequestValidator;
use crate::storage::{ApplicationRegistry, TokenStore};
use crate::types::UserId;

/// Which leg of the authorize flow a request is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeMode {
    /// First touch (`GET`). Issues only if an equivalent grant exists.
    Init,
    /// The user approved the consent prompt (`POST`).
    Consented,
}

/// Orchestrates the authorization endpoint.
pub struct AuthorizationService {
    applications: Arc<dyn ApplicationRegistry>,
    validator: AuthorizationRequestValidator,
    silent_auth: SilentAuthChecker,
    issuer: AuthorizationCodeIssuer,
}

impl AuthorizationService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationRegistry>,
        store: Arc<dyn TokenStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn SecretGenerator>,
        config: &OAuthConfig,
    ) -> Self {
        Self {
            applications,
            validator: AuthorizationRequestValidator::new(config),
            silent_auth: SilentAuthChecker::new(store.clone(), config.silent_auth_query_limit),
            issuer: AuthorizationCodeIssuer::new(store, hasher, generator),
        }
    }

    /// Handles an authorization request for an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`](crate::error::ClientError) if validation
    /// fails, or a storage error.
    pub async fn authorize(
        &self,
        user_id: UserId,
        request: &AuthorizationRequest,
        mode: AuthorizeMode,
    ) -> AuthResult<AuthorizeOutcome> {
        debug!(
            user_id = %user_id,
            client_id = %request.client_id,
            mode = ?mode,
            "Processing authorization request"
        );

        let application = self
            .applications
            .find_by_client_id(&request.client_id)
            .await?;

        let validated = self
            .validator
            .validate(application.as_ref(), request)
            .inspect_err(|e| {
                warn!(
                    client_id = %request.client_id,
                    kind = e.kind(),
                    "Authorization request rejected"
                );
            })?;

        if mode == AuthorizeMode::Init
            && let SilentAuthDecision::ConsentRequired(prompt) =
                self.silent_auth.check(user_id, &validated).await?
        {
            return Ok(AuthorizeOutcome::ConsentRequired(prompt));
        }

        let delivery = self.issuer.issue(user_id, &validated).await?;
        Ok(AuthorizeOutcome::Issued(delivery))
    }
}
