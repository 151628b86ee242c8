//! Client application storage.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use tollgate_auth::types::{Application, ApplicationId, ScopeSet, UserId};

use crate::{PgPool, StorageError, StorageResult};

const APPLICATION_COLUMNS: &str =
    "id, owner_id, name, client_id, secret_hash, scopes, redirect_uris, confidential, created_at";

type ApplicationTuple = (
    Uuid,
    Option<i64>,
    String,
    String,
    Option<String>,
    Vec<String>,
    Vec<String>,
    bool,
    OffsetDateTime,
);

fn into_application(row: ApplicationTuple) -> StorageResult<Application> {
    let (id, owner_id, name, client_id, secret_hash, scopes, redirect_uris, confidential, created_at) =
        row;
    let scopes = ScopeSet::from_names(scopes.as_slice())
        .map_err(|e| StorageError::serialization(format!("application {client_id}: {e}")))?;

    Ok(Application {
        id: ApplicationId(id),
        owner: owner_id.map(UserId),
        name,
        client_id,
        secret_hash,
        scopes,
        redirect_uris,
        confidential,
        created_at,
    })
}

/// Application storage operations.
pub struct ApplicationStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ApplicationStorage<'a> {
    /// Create a new application storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find an application by client id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_client_id(&self, client_id: &str) -> StorageResult<Option<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM oauth_applications WHERE client_id = $1");
        let row: Option<ApplicationTuple> = query_as(&sql)
            .bind(client_id)
            .fetch_optional(self.pool)
            .await?;

        row.map(into_application).transpose()
    }

    /// Find an application by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: ApplicationId) -> StorageResult<Option<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM oauth_applications WHERE id = $1");
        let row: Option<ApplicationTuple> = query_as(&sql)
            .bind(id.0)
            .fetch_optional(self.pool)
            .await?;

        row.map(into_application).transpose()
    }

    /// Insert, or update the row registered under the same client id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken by another client
    /// id, or an error if the database operation fails.
    pub async fn upsert(&self, application: &Application) -> StorageResult<Application> {
        let sql = format!(
            r#"
            INSERT INTO oauth_applications (
                id, owner_id, name, client_id, secret_hash, scopes,
                redirect_uris, confidential, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (client_id) DO UPDATE
            SET name = EXCLUDED.name,
                secret_hash = EXCLUDED.secret_hash,
                scopes = EXCLUDED.scopes,
                redirect_uris = EXCLUDED.redirect_uris,
                confidential = EXCLUDED.confidential
            RETURNING {APPLICATION_COLUMNS}
            "#
        );
        let row: ApplicationTuple = query_as(&sql)
            .bind(application.id.0)
            .bind(application.owner.map(|o| o.0))
            .bind(&application.name)
            .bind(&application.client_id)
            .bind(application.secret_hash.as_deref())
            .bind(application.scopes.to_names())
            .bind(&application.redirect_uris)
            .bind(application.confidential)
            .bind(application.created_at)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                StorageError::from_insert(e, || format!("application {} already exists", application.id))
            })?;

        into_application(row)
    }

    /// Delete an application. Its grants go with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: ApplicationId) -> StorageResult<bool> {
        let result = query("DELETE FROM oauth_applications WHERE id = $1")
            .bind(id.0)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_auth::types::Scope;

    #[test]
    fn test_into_application() {
        let row: ApplicationTuple = (
            Uuid::new_v4(),
            None,
            "iD".into(),
            "SystemApp.id".into(),
            None,
            vec!["write_api".into(), "read_prefs".into()],
            vec![],
            false,
            OffsetDateTime::now_utc(),
        );
        let app = into_application(row).unwrap();
        assert!(app.is_system());
        assert_eq!(app.scopes, ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]));
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let row: ApplicationTuple = (
            Uuid::new_v4(),
            Some(3),
            "Client".into(),
            "client-1".into(),
            None,
            vec!["write_everything".into()],
            vec![],
            false,
            OffsetDateTime::now_utc(),
        );
        assert!(matches!(
            into_application(row),
            Err(StorageError::Serialization(_))
        ));
    }
}
