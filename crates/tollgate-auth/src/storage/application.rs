//! Application registry trait.
//!
//! Application CRUD lives outside this crate; the authorization core only
//! needs lookups plus the startup upsert of system applications.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Application, ApplicationId};

/// Storage trait for registered client applications.
#[async_trait]
pub trait ApplicationRegistry: Send + Sync {
    /// Finds an application by its public client identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Application>>;

    /// Finds an application by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: ApplicationId) -> AuthResult<Option<Application>>;

    /// Inserts an application, or updates name, scopes, redirect URIs and
    /// confidentiality of the one already registered under the same client
    /// id. Returns the stored record, whose id is the pre-existing one on
    /// update.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, application: &Application) -> AuthResult<Application>;

    /// Deletes an application and every grant issued to it.
    ///
    /// Returns `true` if an application was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: ApplicationId) -> AuthResult<bool>;
}
