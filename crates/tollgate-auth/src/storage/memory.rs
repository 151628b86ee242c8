//! In-memory storage backend.
//!
//! Grants live in a single map behind an async mutex. An exchange holds
//! the mutex from lookup until promote/burn, which gives the same
//! serialization a row lock gives the PostgreSQL backend, at table
//! granularity.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{ApplicationRegistry, PendingGrantLock, TokenStore};
use crate::types::{Application, ApplicationId, Grant, GrantId, UserId};

type GrantMap = HashMap<GrantId, Grant>;

/// Process-local [`TokenStore`] and [`ApplicationRegistry`].
///
/// Cloning is cheap and clones share state.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    grants: Arc<Mutex<GrantMap>>,
    applications: Arc<RwLock<HashMap<ApplicationId, Application>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored grants in any state.
    pub async fn grant_count(&self) -> usize {
        self.grants.lock().await.len()
    }
}

// =============================================================================
// Exchange Lock
// =============================================================================

struct MemoryExchangeLock {
    grants: OwnedMutexGuard<GrantMap>,
    grant: Grant,
}

#[async_trait]
impl PendingGrantLock for MemoryExchangeLock {
    fn grant(&self) -> &Grant {
        &self.grant
    }

    async fn promote(mut self: Box<Self>, token_hash: &str) -> AuthResult<OffsetDateTime> {
        let id = self.grant.id;
        let authorized_at = OffsetDateTime::now_utc();
        let row = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| AuthError::internal(format!("locked grant {id} disappeared")))?;
        row.promote(token_hash.to_string(), authorized_at);
        Ok(authorized_at)
    }

    async fn burn(mut self: Box<Self>) -> AuthResult<()> {
        let id = self.grant.id;
        self.grants.remove(&id);
        Ok(())
    }
}

// =============================================================================
// Token Store
// =============================================================================

#[async_trait]
impl TokenStore for MemoryStorage {
    async fn insert(&self, grant: &Grant) -> AuthResult<()> {
        let mut grants = self.grants.lock().await;
        if grants.values().any(|g| g.secret_hash == grant.secret_hash) {
            return Err(AuthError::internal("duplicate grant secret hash"));
        }
        grants.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn begin_exchange(
        &self,
        code_hash: &str,
        issued_after: OffsetDateTime,
    ) -> AuthResult<Option<Box<dyn PendingGrantLock>>> {
        let guard = self.grants.clone().lock_owned().await;
        let found = guard
            .values()
            .find(|g| g.is_pending() && g.secret_hash == code_hash && g.created_at > issued_after)
            .cloned();

        Ok(found.map(|grant| {
            Box::new(MemoryExchangeLock {
                grants: guard,
                grant,
            }) as Box<dyn PendingGrantLock>
        }))
    }

    async fn find_active_by_hash(&self, token_hash: &str) -> AuthResult<Option<Grant>> {
        let grants = self.grants.lock().await;
        Ok(grants
            .values()
            .find(|g| g.is_active() && g.secret_hash == token_hash)
            .cloned())
    }

    async fn find_recent_active(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        limit: usize,
    ) -> AuthResult<Vec<Grant>> {
        let grants = self.grants.lock().await;
        let mut matching: Vec<Grant> = grants
            .values()
            .filter(|g| g.user_id == user_id && g.application_id == application_id && g.is_active())
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.authorized_at().cmp(&a.authorized_at()));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn find_labelled(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> AuthResult<Vec<Grant>> {
        let grants = self.grants.lock().await;
        let mut matching: Vec<Grant> = grants
            .values()
            .filter(|g| {
                g.user_id == user_id && g.application_id == application_id && g.pat.is_some()
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn rotate_secret(
        &self,
        id: GrantId,
        user_id: UserId,
        token_hash: &str,
        preview: &str,
    ) -> AuthResult<Option<OffsetDateTime>> {
        let mut grants = self.grants.lock().await;
        let Some(grant) = grants
            .get_mut(&id)
            .filter(|g| g.user_id == user_id && g.is_active() && g.pat.is_some())
        else {
            return Ok(None);
        };
        let authorized_at = OffsetDateTime::now_utc();
        grant.promote(token_hash.to_string(), authorized_at);
        if let Some(label) = grant.pat.as_mut() {
            label.preview = preview.to_string();
        }
        Ok(Some(authorized_at))
    }

    async fn delete_by_id(&self, id: GrantId, user_id: UserId) -> AuthResult<bool> {
        let mut grants = self.grants.lock().await;
        if grants.get(&id).is_some_and(|g| g.user_id == user_id) {
            grants.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|_, g| g.secret_hash != token_hash);
        Ok(grants.len() != before)
    }

    async fn delete_by_application(
        &self,
        application_id: ApplicationId,
        user_id: UserId,
        keep: &[GrantId],
    ) -> AuthResult<u64> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|id, g| {
            g.application_id != application_id || g.user_id != user_id || keep.contains(id)
        });
        Ok((before - grants.len()) as u64)
    }

    async fn delete_pending_before(&self, cutoff: OffsetDateTime) -> AuthResult<u64> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|_, g| !(g.is_pending() && g.created_at < cutoff));
        Ok((before - grants.len()) as u64)
    }
}

// =============================================================================
// Application Registry
// =============================================================================

#[async_trait]
impl ApplicationRegistry for MemoryStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Application>> {
        let apps = self.applications.read().await;
        Ok(apps.values().find(|a| a.client_id == client_id).cloned())
    }

    async fn find_by_id(&self, id: ApplicationId) -> AuthResult<Option<Application>> {
        Ok(self.applications.read().await.get(&id).cloned())
    }

    async fn upsert(&self, application: &Application) -> AuthResult<Application> {
        let mut apps = self.applications.write().await;
        if let Some(existing) = apps
            .values_mut()
            .find(|a| a.client_id == application.client_id)
        {
            existing.name = application.name.clone();
            existing.scopes = application.scopes.clone();
            existing.redirect_uris = application.redirect_uris.clone();
            existing.confidential = application.confidential;
            existing.secret_hash = application.secret_hash.clone();
            return Ok(existing.clone());
        }
        apps.insert(application.id, application.clone());
        Ok(application.clone())
    }

    async fn delete(&self, id: ApplicationId) -> AuthResult<bool> {
        let removed = self.applications.write().await.remove(&id).is_some();
        if removed {
            self.grants
                .lock()
                .await
                .retain(|_, g| g.application_id != id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::{Scope, ScopeSet};

    fn pending(hash: &str, age: Duration) -> Grant {
        let mut grant = Grant::pending(
            UserId(1),
            ApplicationId::new(),
            hash.to_string(),
            ScopeSet::from([Scope::ReadPrefs]),
            "https://client.example/cb".to_string(),
            None,
        );
        grant.created_at = OffsetDateTime::now_utc() - age;
        grant
    }

    #[tokio::test]
    async fn test_exchange_lock_promotes_in_place() {
        let store = MemoryStorage::new();
        let grant = pending("code", Duration::ZERO);
        store.insert(&grant).await.unwrap();

        let since = OffsetDateTime::now_utc() - Duration::from_secs(60);
        let lock = store.begin_exchange("code", since).await.unwrap().unwrap();
        assert_eq!(lock.grant().id, grant.id);
        lock.promote("token").await.unwrap();

        assert!(store.begin_exchange("code", since).await.unwrap().is_none());
        let active = store.find_active_by_hash("token").await.unwrap().unwrap();
        assert_eq!(active.id, grant.id);
        assert_eq!(store.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_lock_leaves_grant_pending() {
        let store = MemoryStorage::new();
        store.insert(&pending("code", Duration::ZERO)).await.unwrap();
        let since = OffsetDateTime::now_utc() - Duration::from_secs(60);

        let lock = store.begin_exchange("code", since).await.unwrap();
        drop(lock);

        assert!(store.begin_exchange("code", since).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_burn_deletes_grant() {
        let store = MemoryStorage::new();
        store.insert(&pending("code", Duration::ZERO)).await.unwrap();
        let since = OffsetDateTime::now_utc() - Duration::from_secs(60);

        let lock = store.begin_exchange("code", since).await.unwrap().unwrap();
        lock.burn().await.unwrap();
        assert_eq!(store.grant_count().await, 0);
    }

    #[tokio::test]
    async fn test_begin_exchange_ignores_old_codes() {
        let store = MemoryStorage::new();
        store
            .insert(&pending("old", Duration::from_secs(600)))
            .await
            .unwrap();
        let since = OffsetDateTime::now_utc() - Duration::from_secs(180);
        assert!(store.begin_exchange("old", since).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_pending_before_spares_active() {
        let store = MemoryStorage::new();
        store
            .insert(&pending("old", Duration::from_secs(600)))
            .await
            .unwrap();
        let mut active = Grant::active(UserId(1), ApplicationId::new(), "t".into(), ScopeSet::new());
        active.created_at = OffsetDateTime::now_utc() - Duration::from_secs(600);
        store.insert(&active).await.unwrap();

        let cutoff = OffsetDateTime::now_utc() - Duration::from_secs(180);
        assert_eq!(store.delete_pending_before(cutoff).await.unwrap(), 1);
        assert!(store.find_active_by_hash("t").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_application_cascades() {
        let store = MemoryStorage::new();
        let app = Application::new(Some(UserId(1)), "App", "client", ScopeSet::new(), vec![]);
        let app = store.upsert(&app).await.unwrap();
        let grant = Grant::active(UserId(1), app.id, "t".into(), ScopeSet::new());
        store.insert(&grant).await.unwrap();

        assert!(store.delete(app.id).await.unwrap());
        assert_eq!(store.grant_count().await, 0);
        assert!(!store.delete(app.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_id() {
        let store = MemoryStorage::new();
        let first = Application::new(None, "Web", "SystemApp.web", ScopeSet::new(), vec![]);
        let stored = store.upsert(&first).await.unwrap();

        let second = Application::new(
            None,
            "Web v2",
            "SystemApp.web",
            ScopeSet::from([Scope::WebUser]),
            vec![],
        );
        let updated = store.upsert(&second).await.unwrap();
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.name, "Web v2");
        assert!(updated.scopes.contains(Scope::WebUser));
    }
}
