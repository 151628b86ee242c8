//! Token revocation.
//!
//! Revocation deletes grants outright; there are no tombstones. Deleting a
//! grant that is already gone is not an error.

use std::sync::Arc;

use tracing::{debug, info};

use crate::AuthResult;
use crate::crypto::SecretHasher;
use crate::storage::{ApplicationRegistry, TokenStore};
use crate::types::{ApplicationId, GrantId, UserId};

/// Single and bulk grant revocation.
pub struct RevocationService {
    store: Arc<dyn TokenStore>,
    applications: Arc<dyn ApplicationRegistry>,
    hasher: Arc<dyn SecretHasher>,
}

impl RevocationService {
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

    /// Revokes one of the user's grants. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn revoke_by_id(&self, user_id: UserId, id: GrantId) -> AuthResult<()> {
        let deleted = self.store.delete_by_id(id, user_id).await?;
        debug!(user_id = %user_id, grant_id = %id, deleted, "Revoked grant by id");
        Ok(())
    }

    /// Revokes the grant holding `access_token`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn revoke_by_access_token(&self, access_token: &str) -> AuthResult<()> {
        let deleted = self
            .store
            .delete_by_hash(&self.hasher.hash(access_token))
            .await?;
        debug!(deleted, "Revoked grant by access token");
        Ok(())
    }

    /// Revokes all of the user's grants for an application, except those
    /// listed in `keep`. Returns the number revoked.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn revoke_by_application(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        keep: &[GrantId],
    ) -> AuthResult<u64> {
        let count = self
            .store
            .delete_by_application(application_id, user_id, keep)
            .await?;
        info!(
            user_id = %user_id,
            application_id = %application_id,
            kept = keep.len(),
            count,
            "Revoked application grants"
        );
        Ok(count)
    }

    /// Like [`revoke_by_application`](Self::revoke_by_application), keyed by
    /// public client id. An unknown client id revokes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    pub async fn revoke_by_client(
        &self,
        user_id: UserId,
        client_id: &str,
        keep: &[GrantId],
    ) -> AuthResult<u64> {
        match self.applications.find_by_client_id(client_id).await? {
            Some(app) => self.revoke_by_application(user_id, app.id, keep).await,
            None => {
                debug!(client_id = %client_id, "No application to revoke grants for");
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Hasher;
    use crate::storage::MemoryStorage;
    use crate::types::{Application, Grant, ScopeSet};

    async fn setup() -> (Arc<MemoryStorage>, RevocationService, Application) {
        let store = Arc::new(MemoryStorage::new());
        let app = Application::new(None, "Web", "SystemApp.web", ScopeSet::new(), vec![]);
        let app = store.upsert(&app).await.unwrap();
        let service = RevocationService::new(store.clone(), store.clone(), Arc::new(Sha256Hasher));
        (store, service, app)
    }

    async fn active(store: &MemoryStorage, user: i64, app: &Application, token: &str) -> Grant {
        let grant = Grant::active(UserId(user), app.id, Sha256Hasher.hash(token), ScopeSet::new());
        store.insert(&grant).await.unwrap();
        grant
    }

    #[tokio::test]
    async fn test_revoke_by_id_is_idempotent() {
        let (store, service, app) = setup().await;
        let grant = active(&store, 1, &app, "t1").await;

        service.revoke_by_id(UserId(1), grant.id).await.unwrap();
        assert_eq!(store.grant_count().await, 0);
        service.revoke_by_id(UserId(1), grant.id).await.unwrap();
        service.revoke_by_id(UserId(1), GrantId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_by_id_is_scoped_to_user() {
        let (store, service, app) = setup().await;
        let grant = active(&store, 1, &app, "t1").await;

        service.revoke_by_id(UserId(2), grant.id).await.unwrap();
        assert_eq!(store.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_by_access_token() {
        let (store, service, app) = setup().await;
        active(&store, 1, &app, "t1").await;
        active(&store, 1, &app, "t2").await;

        service.revoke_by_access_token("t1").await.unwrap();
        service.revoke_by_access_token("t1").await.unwrap();
        assert!(store.find_active_by_hash(&Sha256Hasher.hash("t1")).await.unwrap().is_none());
        assert!(store.find_active_by_hash(&Sha256Hasher.hash("t2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_other_sessions_keeps_current() {
        let (store, service, app) = setup().await;
        let current = active(&store, 1, &app, "current").await;
        active(&store, 1, &app, "other-1").await;
        active(&store, 1, &app, "other-2").await;
        active(&store, 2, &app, "someone-else").await;

        let count = service
            .revoke_by_client(UserId(1), "SystemApp.web", &[current.id])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(store.find_active_by_hash(&Sha256Hasher.hash("current")).await.unwrap().is_some());
        assert!(store.find_active_by_hash(&Sha256Hasher.hash("someone-else")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_by_unknown_client_is_noop() {
        let (store, service, app) = setup().await;
        active(&store, 1, &app, "t1").await;
        assert_eq!(service.revoke_by_client(UserId(1), "nope", &[]).await.unwrap(), 0);
        assert_eq!(store.grant_count().await, 1);
    }
}
