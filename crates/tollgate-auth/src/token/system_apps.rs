//! First-party system applications.
//!
//! System applications have no owner. They are upserted into the
//! application registry once at startup and the resulting
//! [`SystemAppRegistry`] is handed to whatever needs it. Third parties can
//! never drive the authorize or token endpoints with their client ids.

use std::sync::Arc;

use tracing::{debug, info};

use crate::AuthResult;
use crate::crypto::{SecretGenerator, SecretHasher};
use crate::error::{AuthError, ClientError};
use crate::storage::{ApplicationRegistry, TokenStore};
use crate::types::{Application, Grant, GrantId, Scope, ScopeSet, UserId};

pub const WEB_CLIENT_ID: &str = "SystemApp.web";
pub const PAT_CLIENT_ID: &str = "SystemApp.pat";
pub const ID_CLIENT_ID: &str = "SystemApp.id";
pub const RAPID_CLIENT_ID: &str = "SystemApp.rapid";

/// The fixed set of system applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemApp {
    /// The first-party website session.
    Web,
    /// Holder of personal access tokens.
    PersonalAccessToken,
    /// The iD editor.
    Id,
    /// The Rapid editor.
    Rapid,
}

impl SystemApp {
    pub const ALL: [SystemApp; 4] = [
        SystemApp::Web,
        SystemApp::PersonalAccessToken,
        SystemApp::Id,
        SystemApp::Rapid,
    ];

    #[must_use]
    pub fn client_id(self) -> &'static str {
        match self {
            Self::Web => WEB_CLIENT_ID,
            Self::PersonalAccessToken => PAT_CLIENT_ID,
            Self::Id => ID_CLIENT_ID,
            Self::Rapid => RAPID_CLIENT_ID,
        }
    }

    #[must_use]
    pub fn scopes(self) -> ScopeSet {
        match self {
            Self::Web => ScopeSet::from([Scope::WebUser]),
            Self::PersonalAccessToken => ScopeSet::public(),
            Self::Id | Self::Rapid => ScopeSet::from([
                Scope::ReadPrefs,
                Scope::WritePrefs,
                Scope::WriteApi,
                Scope::ReadGpx,
                Scope::WriteNotes,
            ]),
        }
    }

    fn display_name(self, site_name: &str) -> String {
        match self {
            Self::Web => site_name.to_string(),
            Self::PersonalAccessToken => "Personal Access Token".to_string(),
            Self::Id => "iD".to_string(),
            Self::Rapid => "Rapid".to_string(),
        }
    }

    #[must_use]
    pub fn from_client_id(client_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|app| app.client_id() == client_id)
    }
}

/// Registered system applications, resolved to their stored records.
#[derive(Debug, Clone)]
pub struct SystemAppRegistry {
    web: Application,
    pat: Application,
    id: Application,
    rapid: Application,
}

impl SystemAppRegistry {
    /// Upserts every system application and returns the stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if any upsert fails.
    pub async fn register(
        applications: &dyn ApplicationRegistry,
        site_name: &str,
    ) -> AuthResult<Self> {
        let register = |app: SystemApp| async move {
            let record = Application::new(
                None,
                app.display_name(site_name),
                app.client_id(),
                app.scopes(),
                Vec::new(),
            );
            let stored = applications.upsert(&record).await?;
            info!(client_id = %stored.client_id, application_id = %stored.id, "Registered system app");
            Ok::<_, AuthError>(stored)
        };

        Ok(Self {
            web: register(SystemApp::Web).await?,
            pat: register(SystemApp::PersonalAccessToken).await?,
            id: register(SystemApp::Id).await?,
            rapid: register(SystemApp::Rapid).await?,
        })
    }

    #[must_use]
    pub fn get(&self, app: SystemApp) -> &Application {
        match app {
            SystemApp::Web => &self.web,
            SystemApp::PersonalAccessToken => &self.pat,
            SystemApp::Id => &self.id,
            SystemApp::Rapid => &self.rapid,
        }
    }

    #[must_use]
    pub fn by_client_id(&self, client_id: &str) -> Option<&Application> {
        SystemApp::from_client_id(client_id).map(|app| self.get(app))
    }
}

/// A freshly minted access token. The secret is not recoverable later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub id: GrantId,
    pub access_token: String,
}

/// Mints active tokens for system applications directly, without a code
/// exchange.
pub struct SystemTokenService {
    apps: Arc<SystemAppRegistry>,
    store: Arc<dyn TokenStore>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn SecretGenerator>,
}

impl SystemTokenService {
    #[must_use]
    pub fn new(
        apps: Arc<SystemAppRegistry>,
        store: Arc<dyn TokenStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn SecretGenerator>,
    ) -> Self {
        Self {
            apps,
            store,
            hasher,
            generator,
        }
    }

    /// Creates an access token for `user_id` under the system app with the
    /// given client id, carrying all of that app's scopes.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownClient` if `client_id` is not a system
    /// app, or a storage error.
    pub async fn create_access_token(
        &self,
        client_id: &str,
        user_id: UserId,
    ) -> AuthResult<IssuedToken> {
        let app = self
            .apps
            .by_client_id(client_id)
            .ok_or(ClientError::UnknownClient)?;

        let access_token = self.generator.generate();
        let grant = Grant::active(
            user_id,
            app.id,
            self.hasher.hash(&access_token),
            app.scopes.clone(),
        );
        self.store.insert(&grant).await?;

        debug!(client_id = %client_id, user_id = %user_id, grant_id = %grant.id, "Created system app access token");
        Ok(IssuedToken {
            id: grant.id,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{RandomSecretGenerator, Sha256Hasher};
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let store = MemoryStorage::new();
        let first = SystemAppRegistry::register(&store, "Tollgate").await.unwrap();
        let second = SystemAppRegistry::register(&store, "Tollgate").await.unwrap();

        for app in SystemApp::ALL {
            assert_eq!(first.get(app).id, second.get(app).id);
            assert!(first.get(app).is_system());
        }
        assert_eq!(first.get(SystemApp::Web).name, "Tollgate");
        assert!(first.get(SystemApp::Web).scopes.contains(Scope::WebUser));
        assert!(!first.get(SystemApp::PersonalAccessToken).scopes.contains(Scope::WebUser));
    }

    #[tokio::test]
    async fn test_create_access_token() {
        let store = Arc::new(MemoryStorage::new());
        let apps = Arc::new(SystemAppRegistry::register(store.as_ref(), "Tollgate").await.unwrap());
        let service = SystemTokenService::new(
            apps.clone(),
            store.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(RandomSecretGenerator),
        );

        let issued = service.create_access_token(WEB_CLIENT_ID, UserId(4)).await.unwrap();
        let grant = store
            .find_active_by_hash(&Sha256Hasher.hash(&issued.access_token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.id, issued.id);
        assert_eq!(grant.application_id, apps.get(SystemApp::Web).id);
        assert_eq!(grant.scopes, ScopeSet::from([Scope::WebUser]));

        let err = service.create_access_token("client-1", UserId(4)).await.unwrap_err();
        assert!(matches!(err, AuthError::Client(ClientError::UnknownClient)));
    }
}
