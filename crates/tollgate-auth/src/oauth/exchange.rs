//! Authorization code exchange.
//!
//! Redeems a pending code for an access token. The pending grant is locked
//! for the whole exchange; on success it is promoted in place, on any
//! verification failure it is deleted so the code can never be replayed.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::crypto::{SecretGenerator, SecretHasher, verify_client_secret};
use crate::error::{ClientError, GrantError};
use crate::oauth::pkce;
use crate::storage::{ApplicationRegistry, TokenStore};
use crate::types::{Application, Grant};

/// The only grant type this server implements.
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// Token endpoint form parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Client credentials presented at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl ClientCredentials {
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    #[must_use]
    pub fn confidential(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(secret.into()),
        }
    }
}

/// A parsed code exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub client: ClientCredentials,
    pub code: String,
    pub code_verifier: Option<String>,
    /// Must equal the redirect URI the code was issued for. An empty value
    /// stands for an omitted parameter and never matches.
    pub redirect_uri: String,
}

impl ExchangeRequest {
    /// Builds an exchange from token endpoint parameters. Credentials from
    /// an HTTP Basic header take precedence over form fields.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnsupportedGrantType` for any grant type but
    ///   `authorization_code`
    /// - `ClientError::UnknownClient` if no client id was supplied
    pub fn from_token_request(
        request: TokenRequest,
        basic: Option<ClientCredentials>,
    ) -> Result<Self, ClientError> {
        if request.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(ClientError::UnsupportedGrantType(request.grant_type));
        }

        let client = match (basic, request.client_id) {
            (Some(basic), _) => basic,
            (None, Some(client_id)) if !client_id.is_empty() => ClientCredentials {
                client_id,
                client_secret: request.client_secret,
            },
            _ => return Err(ClientError::UnknownClient),
        };

        Ok(Self {
            client,
            code: request.code,
            code_verifier: request.code_verifier.filter(|v| !v.is_empty()),
            redirect_uri: request.redirect_uri.unwrap_or_default(),
        })
    }
}

/// Successful token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Space-joined, sorted.
    pub scope: String,
    /// Unix timestamp of the promotion.
    pub created_at: i64,
}

/// Redeems authorization codes.
pub struct CodeExchanger {
    store: Arc<dyn TokenStore>,
    applications: Arc<dyn ApplicationRegistry>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn SecretGenerator>,
    code_timeout: Duration,
}

impl CodeExchanger {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        applications: Arc<dyn ApplicationRegistry>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn SecretGenerator>,
        code_timeout: Duration,
    ) -> Self {
        Self {
            store,
            applications,
            hasher,
            generator,
            code_timeout,
        }
    }

    /// Authenticates the client. Confidential clients must present their
    /// secret; system applications are never accepted here.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnknownClient` if the client is unknown or a system app
    /// - `ClientError::BadClientSecret` if a confidential client's secret is
    ///   missing or wrong
    pub async fn authenticate_client(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<Application> {
        let app = self
            .applications
            .find_by_client_id(&credentials.client_id)
            .await?
            .filter(|app| !app.is_system())
            .ok_or(ClientError::UnknownClient)?;

        if app.confidential {
            let authenticated = match (&credentials.client_secret, &app.secret_hash) {
                (Some(secret), Some(hash)) => verify_client_secret(secret, hash),
                _ => false,
            };
            if !authenticated {
                return Err(ClientError::BadClientSecret.into());
            }
        }

        Ok(app)
    }

    /// Exchanges a code for an access token.
    ///
    /// Client authentication happens before the code is looked up, so a
    /// failed client check leaves the code redeemable. Every later failure
    /// burns it.
    ///
    /// # Errors
    ///
    /// - [`ClientError`] if client authentication fails
    /// - [`GrantError`] if the code is unknown, used, expired, issued to a
    ///   different client, or fails redirect URI or PKCE verification
    /// - `AuthError::Storage` if the store fails; nothing is committed then
    pub async fn exchange(&self, request: &ExchangeRequest) -> AuthResult<TokenResponse> {
        let app = self.authenticate_client(&request.client).await?;

        let code_hash = self.hasher.hash(&request.code);
        let issued_after = OffsetDateTime::now_utc() - self.code_timeout;

        let Some(lock) = self.store.begin_exchange(&code_hash, issued_after).await? else {
            debug!(client_id = %app.client_id, "Authorization code not found or already used");
            return Err(GrantError::NotFoundOrUsed.into());
        };

        if let Err(e) = Self::verify(lock.grant(), &app, request) {
            warn!(
                client_id = %app.client_id,
                grant_id = %lock.grant().id,
                kind = e.kind(),
                "Code exchange rejected, burning code"
            );
            lock.burn().await?;
            return Err(e.into());
        }

        let grant_id = lock.grant().id;
        let scope = lock.grant().scopes.to_string();

        let access_token = self.generator.generate();
        let authorized_at = lock.promote(&self.hasher.hash(&access_token)).await?;

        info!(
            client_id = %app.client_id,
            grant_id = %grant_id,
            scope = %scope,
            "Authorization code exchanged"
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            scope,
            created_at: authorized_at.unix_timestamp(),
        })
    }

    fn verify(grant: &Grant, app: &Application, request: &ExchangeRequest) -> Result<(), GrantError> {
        // A code presented by another client is treated as unknown.
        if grant.application_id != app.id {
            return Err(GrantError::NotFoundOrUsed);
        }

        if request.redirect_uri.is_empty()
            || grant.redirect_uri.as_deref() != Some(request.redirect_uri.as_str())
        {
            return Err(GrantError::RedirectUriMismatch);
        }

        pkce::verify(grant.challenge(), request.code_verifier.as_deref())
    }
}
