//! Personal access tokens.
//!
//! A PAT is a named grant under the PAT system application, created
//! directly in the Active state. The secret is shown once at creation (and
//! on every reset); afterwards only its leading characters remain visible
//! as a preview.

use std::sync::Arc;

use tracing::info;

use crate::AuthResult;
use crate::config::OAuthConfig;
use crate::crypto::{SecretGenerator, SecretHasher};
use crate::error::{AuthError, ClientError};
use crate::storage::TokenStore;
use crate::token::system_apps::{IssuedToken, SystemApp, SystemAppRegistry};
use crate::types::{ApplicationId, Grant, GrantId, PatSummary, ScopeSet, UserId};

/// Creates, lists, rotates and revokes personal access tokens.
pub struct PatService {
    store: Arc<dyn TokenStore>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn SecretGenerator>,
    pat_app_id: ApplicationId,
    allowed_scopes: ScopeSet,
    preview_length: usize,
    name_max_length: usize,
    limit: usize,
}

impl PatService {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn SecretGenerator>,
        apps: &SystemAppRegistry,
        config: &OAuthConfig,
    ) -> Self {
        let pat_app = apps.get(SystemApp::PersonalAccessToken);
        Self {
            store,
            hasher,
            generator,
            pat_app_id: pat_app.id,
            allowed_scopes: pat_app.scopes.clone(),
            preview_length: config.secret_preview_length,
            name_max_length: config.pat_name_max_length,
            limit: config.pat_limit,
        }
    }

    /// Creates a PAT and returns its id and plaintext secret.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if the name is empty or too long, or
    ///   the user already holds the maximum number of PATs
    /// - `ClientError::ScopeExceeded` if a scope is not grantable to PATs
    pub async fn create(
        &self,
        user_id: UserId,
        name: &str,
        scopes: ScopeSet,
    ) -> AuthResult<IssuedToken> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > self.name_max_length {
            return Err(AuthError::invalid_request(format!(
                "token name must be 1 to {} characters",
                self.name_max_length
            )));
        }

        let excess = scopes.difference(&self.allowed_scopes);
        if !excess.is_empty() {
            return Err(ClientError::ScopeExceeded {
                scopes: excess.iter().map(|s| s.as_str().to_string()).collect(),
            }
            .into());
        }

        let existing = self.store.find_labelled(user_id, self.pat_app_id).await?;
        if existing.len() >= self.limit {
            return Err(AuthError::invalid_request(format!(
                "at most {} personal access tokens are allowed",
                self.limit
            )));
        }

        let secret = self.generator.generate();
        let grant = Grant::active(user_id, self.pat_app_id, self.hasher.hash(&secret), scopes)
            .with_pat_label(name, self.preview(&secret));
        self.store.insert(&grant).await?;

        info!(user_id = %user_id, grant_id = %grant.id, "Personal access token created");
        Ok(IssuedToken {
            id: grant.id,
            access_token: secret,
        })
    }

    /// Lists the user's PATs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn list(&self, user_id: UserId) -> AuthResult<Vec<PatSummary>> {
        let grants = self.store.find_labelled(user_id, self.pat_app_id).await?;
        Ok(grants.iter().filter_map(Grant::pat_summary).collect())
    }

    /// Replaces a PAT's secret. The old secret stops working immediately.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the user has no PAT with this
    /// id, or a storage error.
    pub async fn reset(&self, user_id: UserId, id: GrantId) -> AuthResult<String> {
        let secret = self.generator.generate();
        let rotated = self
            .store
            .rotate_secret(id, user_id, &self.hasher.hash(&secret), &self.preview(&secret))
            .await?;

        if rotated.is_none() {
            return Err(AuthError::invalid_request("unknown personal access token"));
        }

        info!(user_id = %user_id, grant_id = %id, "Personal access token reset");
        Ok(secret)
    }

    fn preview(&self, secret: &str) -> String {
        secret.chars().take(self.preview_length).collect()
    }
}
