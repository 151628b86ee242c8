//! Access token lookup for resource servers (RFC 7662 shaped).
//!
//! The response never says why a token is inactive: unknown, revoked and
//! still-pending secrets all read `{"active": false}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AuthResult;
use crate::crypto::SecretHasher;
use crate::storage::{ApplicationRegistry, TokenStore};

/// Introspection response body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenInfo {
    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Space-joined, sorted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The end user the token acts for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Unix timestamp of authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenInfo {
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Resolves access tokens to the grant behind them.
pub struct TokenLookup {
    store: Arc<dyn TokenStore>,
    applications: Arc<dyn ApplicationRegistry>,
    hasher: Arc<dyn SecretHasher>,
}

impl TokenLookup {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        applications: Arc<dyn ApplicationRegistry>,
        hasher: Arc<dyn SecretHasher>,
    ) -> Self {
        Self {
            store,
            applications,
            hasher,
        }
    }

    /// Looks up an access token.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails; unknown tokens are
    /// reported as inactive.
    pub async fn introspect(&self, access_token: &str) -> AuthResult<TokenInfo> {
        let Some(grant) = self
            .store
            .find_active_by_hash(&self.hasher.hash(access_token))
            .await?
        else {
            debug!("Introspected token is not active");
            return Ok(TokenInfo::inactive());
        };

        // The application can vanish between the two reads; its grants
        // are cascaded away with it.
        let Some(application) = self.applications.find_by_id(grant.application_id).await? else {
            return Ok(TokenInfo::inactive());
        };

        Ok(TokenInfo {
            active: true,
            client_id: Some(application.client_id),
            scope: Some(grant.scopes.to_string()),
            sub: Some(grant.user_id.to_string()),
            iat: grant.authorized_at().map(|at| at.unix_timestamp()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Hasher;
    use crate::storage::MemoryStorage;
    use crate::types::{Application, Grant, Scope, ScopeSet, UserId};

    #[tokio::test]
    async fn test_introspect_active_and_pending() {
        let store = Arc::new(MemoryStorage::new());
        let app = Application::new(
            Some(UserId(9)),
            "Client",
            "client-1",
            ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]),
            vec!["https://client.example/cb".into()],
        );
        let app = store.upsert(&app).await.unwrap();

        let active = Grant::active(
            UserId(5),
            app.id,
            Sha256Hasher.hash("live"),
            ScopeSet::from([Scope::WriteApi, Scope::ReadPrefs]),
        );
        store.insert(&active).await.unwrap();
        let pending = Grant::pending(
            UserId(5),
            app.id,
            Sha256Hasher.hash("code"),
            ScopeSet::new(),
            "https://client.example/cb".into(),
            None,
        );
        store.insert(&pending).await.unwrap();

        let lookup = TokenLookup::new(store.clone(), store.clone(), Arc::new(Sha256Hasher));

        let info = lookup.introspect("live").await.unwrap();
        assert!(info.active);
        assert_eq!(info.client_id.as_deref(), Some("client-1"));
        assert_eq!(info.scope.as_deref(), Some("read_prefs write_api"));
        assert_eq!(info.sub.as_deref(), Some("5"));
        assert!(info.iat.is_some());

        assert_eq!(lookup.introspect("code").await.unwrap(), TokenInfo::inactive());
        assert_eq!(lookup.introspect("nope").await.unwrap(), TokenInfo::inactive());
    }

    #[test]
    fn test_inactive_serializes_bare() {
        let json = serde_json::to_value(TokenInfo::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }
}
