//! Grant storage trait.
//!
//! One table holds pending authorization codes, active access tokens and
//! personal access tokens. Every lookup is keyed on a one-way hash; raw
//! secrets never reach the store.
//!
//! # Locking
//!
//! [`TokenStore::begin_exchange`] is the only locking operation. It opens a
//! transaction and row-locks the pending grant; the returned
//! [`PendingGrantLock`] must be finished with either
//! [`PendingGrantLock::promote`] or [`PendingGrantLock::burn`]. Dropping the
//! lock without finishing rolls the transaction back, leaving the code
//! untouched.
//!
//! Two concurrent exchanges of the same code serialize on the row lock:
//! the second one observes the grant already active (or gone) and gets
//! `None`.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::{ApplicationId, Grant, GrantId, UserId};

/// Exclusive hold on a pending grant during a code exchange.
#[async_trait]
pub trait PendingGrantLock: Send {
    /// The locked grant. Always in the Pending state.
    fn grant(&self) -> &Grant;

    /// Promotes the grant to Active in place: replaces its secret hash with
    /// `token_hash`, stamps `authorized_at` and clears the PKCE challenge,
    /// then commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or the commit fails; nothing is
    /// persisted in that case.
    async fn promote(self: Box<Self>, token_hash: &str) -> AuthResult<OffsetDateTime>;

    /// Deletes the pending grant and commits. Used when the exchange fails
    /// so the code can never be replayed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or the commit fails.
    async fn burn(self: Box<Self>) -> AuthResult<()>;
}

/// Storage trait for grants.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Inserts a grant in whatever state it carries. A single non-locking
    /// insert; codes and tokens are unique by construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert(&self, grant: &Grant) -> AuthResult<()>;

    /// Finds a pending grant by code hash, created after `issued_after`,
    /// and locks it for the rest of the exchange.
    ///
    /// Returns `None` if no such pending grant exists, including when it
    /// was promoted by a concurrent exchange that committed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn begin_exchange(
        &self,
        code_hash: &str,
        issued_after: OffsetDateTime,
    ) -> AuthResult<Option<Box<dyn PendingGrantLock>>>;

    /// Finds an active grant by access token hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_active_by_hash(&self, token_hash: &str) -> AuthResult<Option<Grant>>;

    /// Returns up to `limit` of the user's active grants for an
    /// application, most recently authorized first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_recent_active(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        limit: usize,
    ) -> AuthResult<Vec<Grant>>;

    /// Returns the user's grants for an application that carry a personal
    /// access token label, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_labelled(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> AuthResult<Vec<Grant>>;

    /// Replaces the secret of one of the user's personal access tokens and
    /// sets a new preview. Returns the new `authorized_at`, or `None` if no
    /// such token exists for this user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn rotate_secret(
        &self,
        id: GrantId,
        user_id: UserId,
        token_hash: &str,
        preview: &str,
    ) -> AuthResult<Option<OffsetDateTime>>;

    /// Deletes one of the user's grants. Returns `false` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_id(&self, id: GrantId, user_id: UserId) -> AuthResult<bool>;

    /// Deletes the grant whose secret hashes to `token_hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool>;

    /// Deletes all of the user's grants for an application except the ids
    /// in `keep`. Returns the number of deleted grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_application(
        &self,
        application_id: ApplicationId,
        user_id: UserId,
        keep: &[GrantId],
    ) -> AuthResult<u64>;

    /// Deletes pending grants created before `cutoff`. Never touches active
    /// grants. Returns the number of deleted grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_pending_before(&self, cutoff: OffsetDateTime) -> AuthResult<u64>;
}
