//! Arc-owning storage adapters.
//!
//! These adapters wrap the lifetime-based storage types and own an
//! `Arc<PgPool>`, so they can be handed out as `Arc<dyn TokenStore>` and
//! `Arc<dyn ApplicationRegistry>`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_postgres::PgTransaction;
use time::OffsetDateTime;
use tracing::debug;

use tollgate_auth::storage::{ApplicationRegistry, PendingGrantLock, TokenStore};
use tollgate_auth::types::{Application, ApplicationId, Grant, GrantId, UserId};
use tollgate_auth::{AuthError, AuthResult};

use crate::application::ApplicationStorage;
use crate::grant::{self, GrantStorage};
use crate::PgPool;

// =============================================================================
// Exchange Lock
// =============================================================================

/// A pending grant row-locked inside an open transaction.
///
/// Dropping the lock drops the transaction, which rolls back and releases
/// the row lock.
pub struct PgExchangeLock {
    tx: PgTransaction<'static>,
    grant: Grant,
}

#[async_trait]
impl PendingGrantLock for PgExchangeLock {
    fn grant(&self) -> &Grant {
        &self.grant
    }

    async fn promote(self: Box<Self>, token_hash: &str) -> AuthResult<OffsetDateTime> {
        let Self { mut tx, grant } = *self;
        let authorized_at = grant::promote_locked(&mut tx, grant.id, token_hash).await?;
        tx.commit()
            .await
            .map_err(|e| AuthError::storage(format!("commit failed: {e}")))?;
        debug!(grant_id = %grant.id, "Committed grant promotion");
        Ok(authorized_at)
    }

    async fn burn(self: Box<Self>) -> AuthResult<()> {
        let Self { mut tx, grant } = *self;
        grant::delete_locked(&mut tx, grant.id).await?;
        tx.commit()
            .await
            .map_err(|e| AuthError::storage(format!("commit failed: {e}")))?;
        debug!(grant_id = %grant.id, "Committed burned code");
        Ok(())
    }
}

// =============================================================================
// Arc-Owning Token Store
// =============================================================================

/// Arc-owning PostgreSQL [`TokenStore`].
#[derive(Clone)]
pub struct ArcTokenStore {
    pool: Arc<PgPool>,
}

impl ArcTokenStore {
    /// Create a new Arc-owning token store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for ArcTokenStore {
    async fn insert(&self, grant: &Grant) -> AuthResult<()> {
        GrantStorage::new(&self.pool).insert(grant).await?;
        Ok(())
    }

    async fn begin_exchange(
        &self,
        code_hash: &str,
        issued_after: OffsetDateTime,
    ) -> AuthResult<Option<Box<dyn PendingGrantLock>>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::storage(format!("begin failed: {e}")))?;

        // Without a row the transaction is simply dropped and rolled back.
        let Some(grant) = grant::lock_pending(&mut tx, code_hash, issued_after).await? else {
            return Ok(None);
        };

        Ok(Some(Box::new(PgExchangeLock { tx, grant })))
    }

    async fn find_active_by_hash(&self, token_hash: &str) -> AuthResult<Option<Grant>> {
        Ok(GrantStorage::new(&self.pool)
            .find_active_by_hash(token_hash)
            .await?)
    }

    async fn find_recent_active(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        limit: usize,
    ) -> AuthResult<Vec<Grant>> {
        let limit = i64::try_from(limit)
            .map_err(|_| AuthError::configuration("silent auth query limit out of range"))?;
        Ok(GrantStorage::new(&self.pool)
            .find_recent_active(user_id, application_id, limit)
            .await?)
    }

    async fn find_labelled(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> AuthResult<Vec<Grant>> {
        Ok(GrantStorage::new(&self.pool)
            .find_labelled(user_id, application_id)
            .await?)
    }

    async fn rotate_secret(
        &self,
        id: GrantId,
        user_id: UserId,
        token_hash: &str,
        preview: &str,
    ) -> AuthResult<Option<OffsetDateTime>> {
        Ok(GrantStorage::new(&self.pool)
            .rotate_secret(id, user_id, token_hash, preview)
            .await?)
    }

    async fn delete_by_id(&self, id: GrantId, user_id: UserId) -> AuthResult<bool> {
        Ok(GrantStorage::new(&self.pool).delete_by_id(id, user_id).await?)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        Ok(GrantStorage::new(&self.pool).delete_by_hash(token_hash).await?)
    }

    async fn delete_by_application(
        &self,
        application_id: ApplicationId,
        user_id: UserId,
        keep: &[GrantId],
    ) -> AuthResult<u64> {
        Ok(GrantStorage::new(&self.pool)
            .delete_by_application(application_id, user_id, keep)
            .await?)
    }

    async fn delete_pending_before(&self, cutoff: OffsetDateTime) -> AuthResult<u64> {
        Ok(GrantStorage::new(&self.pool)
            .delete_pending_before(cutoff)
            .await?)
    }
}

// =============================================================================
// Arc-Owning Application Registry
// =============================================================================

/// Arc-owning PostgreSQL [`ApplicationRegistry`].
#[derive(Clone)]
pub struct ArcApplicationRegistry {
    pool: Arc<PgPool>,
}

impl ArcApplicationRegistry {
    /// Create a new Arc-owning application registry.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRegistry for ArcApplicationRegistry {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Application>> {
        Ok(ApplicationStorage::new(&self.pool)
            .find_by_client_id(client_id)
            .await?)
    }

    async fn find_by_id(&self, id: ApplicationId) -> AuthResult<Option<Application>> {
        Ok(ApplicationStorage::new(&self.pool).find_by_id(id).await?)
    }

    async fn upsert(&self, application: &Application) -> AuthResult<Application> {
        Ok(ApplicationStorage::new(&self.pool).upsert(application).await?)
    }

    async fn delete(&self, id: ApplicationId) -> AuthResult<bool> {
        Ok(ApplicationStorage::new(&self.pool).delete(id).await?)
    }
}
