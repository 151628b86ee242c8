//! PostgreSQL storage backend for tollgate-auth
//!
//! Provides persistent storage for:
//!
//! - Client applications (`oauth_applications`)
//! - Grants: pending authorization codes, active access tokens and
//!   personal access tokens (`oauth_grants`)
//!
//! The code exchange runs in a transaction that row-locks the pending
//! grant with `SELECT ... FOR UPDATE`, so concurrent exchanges of the same
//! code serialize and at most one succeeds.
//!
//! # Example
//!
//! ```ignore
//! use tollgate_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/tollgate").await?;
//! storage.migrate().await?;
//!
//! let tokens = storage.token_store();
//! let applications = storage.application_registry();
//! ```

pub mod application;
pub mod grant;
pub mod migrations;
pub mod storage_adapters;

use std::sync::Arc;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use application::ApplicationStorage;
pub use grant::GrantStorage;
pub use storage_adapters::{ArcApplicationRegistry, ArcTokenStore, PgExchangeLock};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists (unique violation).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be decoded into a domain type.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Maps a unique violation to `Conflict`, everything else to `Database`.
    pub(crate) fn from_insert(err: sqlx_core::Error, what: impl FnOnce() -> String) -> Self {
        if let sqlx_core::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(what());
        }
        Self::Database(err)
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidInput(_)
        )
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Migration(_)
        )
    }
}

impl From<StorageError> for tollgate_auth::AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serialization(msg) => Self::internal(format!("corrupt row: {msg}")),
            StorageError::Migration(msg) => Self::configuration(msg),
            other => Self::storage(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for applications and grants.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get application storage operations.
    #[must_use]
    pub fn applications(&self) -> ApplicationStorage<'_> {
        ApplicationStorage::new(&self.pool)
    }

    /// Get grant storage operations.
    #[must_use]
    pub fn grants(&self) -> GrantStorage<'_> {
        GrantStorage::new(&self.pool)
    }

    /// `TokenStore` over this pool.
    #[must_use]
    pub fn token_store(&self) -> ArcTokenStore {
        ArcTokenStore::new(Arc::clone(&self.pool))
    }

    /// `ApplicationRegistry` over this pool.
    #[must_use]
    pub fn application_registry(&self) -> ArcApplicationRegistry {
        ArcApplicationRegistry::new(Arc::clone(&self.pool))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_auth::AuthError;

    #[test]
    fn test_storage_error_not_found() {
        let err = StorageError::not_found("Application abc123");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.to_string(), "Not found: Application abc123");
    }

    #[test]
    fn test_storage_error_conflict() {
        let err = StorageError::conflict("Grant already exists");
        assert!(err.is_conflict());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_storage_error_serialization() {
        let err = StorageError::serialization("unknown scope: write_everything");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_conversion_to_auth_error() {
        let err: AuthError = StorageError::Database(sqlx_core::Error::PoolTimedOut).into();
        assert!(err.is_retryable());

        let err: AuthError = StorageError::serialization("bad method").into();
        assert!(matches!(err, AuthError::Internal { .. }));
        assert!(!err.is_retryable());
    }
}
