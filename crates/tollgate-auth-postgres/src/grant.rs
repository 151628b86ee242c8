//! Grant storage.
//!
//! One table holds pending codes and active tokens. Only hashes are
//! stored; `secret_hash` is unique and is the lookup key for both.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgTransaction;
use time::OffsetDateTime;
use uuid::Uuid;

use tollgate_auth::oauth::pkce::{PkceChallenge, PkceMethod};
use tollgate_auth::types::{
    ApplicationId, Grant, GrantId, GrantState, PatLabel, ScopeSet, UserId,
};

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Row Mapping
// =============================================================================

const GRANT_COLUMNS: &str = "id, user_id, application_id, secret_hash, scopes, redirect_uri, \
     code_challenge, code_challenge_method, authorized_at, pat_name, pat_preview, created_at";

type GrantTuple = (
    Uuid,
    i64,
    Uuid,
    String,
    Vec<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<OffsetDateTime>,
    Option<String>,
    Option<String>,
    OffsetDateTime,
);

/// Grant record from the database.
#[derive(Debug, Clone)]
pub struct GrantRow {
    pub id: Uuid,
    pub user_id: i64,
    pub application_id: Uuid,
    pub secret_hash: String,
    pub scopes: Vec<String>,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub authorized_at: Option<OffsetDateTime>,
    pub pat_name: Option<String>,
    pub pat_preview: Option<String>,
    pub created_at: OffsetDateTime,
}

impl GrantRow {
    fn from_tuple(row: GrantTuple) -> Self {
        Self {
            id: row.0,
            user_id: row.1,
            application_id: row.2,
            secret_hash: row.3,
            scopes: row.4,
            redirect_uri: row.5,
            code_challenge: row.6,
            code_challenge_method: row.7,
            authorized_at: row.8,
            pat_name: row.9,
            pat_preview: row.10,
            created_at: row.11,
        }
    }

    /// Converts to the domain grant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unknown scope names,
    /// unknown PKCE methods, or a half-set challenge.
    pub fn into_grant(self) -> StorageResult<Grant> {
        let scopes = ScopeSet::from_names(self.scopes.as_slice())
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let state = match self.authorized_at {
            Some(authorized_at) => GrantState::Active { authorized_at },
            None => {
                let challenge = match (self.code_challenge, self.code_challenge_method) {
                    (Some(challenge), Some(method)) => {
                        let method: PkceMethod =
                            method.parse().map_err(StorageError::serialization)?;
                        Some(PkceChallenge::new(method, challenge))
                    }
                    (None, None) => None,
                    _ => {
                        return Err(StorageError::serialization(format!(
                            "grant {} has an unpaired code challenge",
                            self.id
                        )));
                    }
                };
                GrantState::Pending { challenge }
            }
        };

        let pat = match (self.pat_name, self.pat_preview) {
            (Some(name), preview) => Some(PatLabel {
                name,
                preview: preview.unwrap_or_default(),
            }),
            (None, _) => None,
        };

        Ok(Grant {
            id: GrantId(self.id),
            user_id: UserId(self.user_id),
            application_id: ApplicationId(self.application_id),
            secret_hash: self.secret_hash,
            scopes,
            redirect_uri: self.redirect_uri,
            state,
            pat,
            created_at: self.created_at,
        })
    }
}

fn into_grants(rows: Vec<GrantTuple>) -> StorageResult<Vec<Grant>> {
    rows.into_iter()
        .map(|row| GrantRow::from_tuple(row).into_grant())
        .collect()
}

// =============================================================================
// Grant Storage
// =============================================================================

/// Grant storage operations on a pool.
pub struct GrantStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> GrantStorage<'a> {
    /// Create a new grant storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a grant in whatever state it carries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id or secret hash is taken.
    pub async fn insert(&self, grant: &Grant) -> StorageResult<()> {
        let (challenge, method) = match grant.challenge() {
            Some(c) => (Some(c.challenge.as_str()), Some(c.method.as_str())),
            None => (None, None),
        };
        let (pat_name, pat_preview) = match &grant.pat {
            Some(label) => (Some(label.name.as_str()), Some(label.preview.as_str())),
            None => (None, None),
        };

        query(
            r#"
            INSERT INTO oauth_grants (
                id, user_id, application_id, secret_hash, scopes, redirect_uri,
                code_challenge, code_challenge_method, authorized_at,
                pat_name, pat_preview, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(grant.id.0)
        .bind(grant.user_id.0)
        .bind(grant.application_id.0)
        .bind(&grant.secret_hash)
        .bind(grant.scopes.to_names())
        .bind(grant.redirect_uri.as_deref())
        .bind(challenge)
        .bind(method)
        .bind(grant.authorized_at())
        .bind(pat_name)
        .bind(pat_preview)
        .bind(grant.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| StorageError::from_insert(e, || format!("grant {} already exists", grant.id)))?;

        Ok(())
    }

    /// Find an active grant by token hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active_by_hash(&self, token_hash: &str) -> StorageResult<Option<Grant>> {
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM oauth_grants \
             WHERE secret_hash = $1 AND authorized_at IS NOT NULL"
        );
        let row: Option<GrantTuple> = query_as(&sql)
            .bind(token_hash)
            .fetch_optional(self.pool)
            .await?;

        row.map(|r| GrantRow::from_tuple(r).into_grant()).transpose()
    }

    /// Most recently authorized active grants of a user for an application.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_recent_active(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
        limit: i64,
    ) -> StorageResult<Vec<Grant>> {
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM oauth_grants \
             WHERE user_id = $1 AND application_id = $2 AND authorized_at IS NOT NULL \
             ORDER BY authorized_at DESC \
             LIMIT $3"
        );
        let rows: Vec<GrantTuple> = query_as(&sql)
            .bind(user_id.0)
            .bind(application_id.0)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        into_grants(rows)
    }

    /// A user's personal access tokens for an application, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_labelled(
        &self,
        user_id: UserId,
        application_id: ApplicationId,
    ) -> StorageResult<Vec<Grant>> {
        let sql = format!(
            "SELECT {GRANT_COLUMNS} FROM oauth_grants \
             WHERE user_id = $1 AND application_id = $2 AND pat_name IS NOT NULL \
             ORDER BY created_at DESC"
        );
        let rows: Vec<GrantTuple> = query_as(&sql)
            .bind(user_id.0)
            .bind(application_id.0)
            .fetch_all(self.pool)
            .await?;

        into_grants(rows)
    }

    /// Replace the secret of a personal access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn rotate_secret(
        &self,
        id: GrantId,
        user_id: UserId,
        token_hash: &str,
        preview: &str,
    ) -> StorageResult<Option<OffsetDateTime>> {
        let row: Option<(OffsetDateTime,)> = query_as(
            r#"
            UPDATE oauth_grants
            SET secret_hash = $3, pat_preview = $4, authorized_at = NOW()
            WHERE id = $1
              AND user_id = $2
              AND authorized_at IS NOT NULL
              AND pat_name IS NOT NULL
            RETURNING authorized_at
            "#,
        )
        .bind(id.0)
        .bind(user_id.0)
        .bind(token_hash)
        .bind(preview)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(at,)| at))
    }

    /// Delete one of a user's grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_by_id(&self, id: GrantId, user_id: UserId) -> StorageResult<bool> {
        let result = query("DELETE FROM oauth_grants WHERE id = $1 AND user_id = $2")
            .bind(id.0)
            .bind(user_id.0)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the grant holding a secret hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        let result = query("DELETE FROM oauth_grants WHERE secret_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user's grants for an application, except `keep`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_by_application(
        &self,
        application_id: ApplicationId,
        user_id: UserId,
        keep: &[GrantId],
    ) -> StorageResult<u64> {
        let keep: Vec<Uuid> = keep.iter().map(|id| id.0).collect();
        let result = query(
            r#"
            DELETE FROM oauth_grants
            WHERE application_id = $1
              AND user_id = $2
              AND NOT (id = ANY($3))
            "#,
        )
        .bind(application_id.0)
        .bind(user_id.0)
        .bind(keep)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete pending grants created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_pending_before(&self, cutoff: OffsetDateTime) -> StorageResult<u64> {
        let result =
            query("DELETE FROM oauth_grants WHERE authorized_at IS NULL AND created_at < $1")
                .bind(cutoff)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Exchange Queries
// =============================================================================

/// Select a pending grant and row-lock it for the rest of `tx`.
///
/// A concurrent exchange blocks here until the first one commits, then
/// re-evaluates the predicate and finds nothing.
pub(crate) async fn lock_pending(
    tx: &mut PgTransaction<'static>,
    code_hash: &str,
    issued_after: OffsetDateTime,
) -> StorageResult<Option<Grant>> {
    let sql = format!(
        "SELECT {GRANT_COLUMNS} FROM oauth_grants \
         WHERE secret_hash = $1 AND authorized_at IS NULL AND created_at > $2 \
         FOR UPDATE"
    );
    let row: Option<GrantTuple> = query_as(&sql)
        .bind(code_hash)
        .bind(issued_after)
        .fetch_optional(&mut **tx)
        .await?;

    row.map(|r| GrantRow::from_tuple(r).into_grant()).transpose()
}

/// Promote a locked pending grant in place.
pub(crate) async fn promote_locked(
    tx: &mut PgTransaction<'static>,
    id: GrantId,
    token_hash: &str,
) -> StorageResult<OffsetDateTime> {
    let row: Option<(OffsetDateTime,)> = query_as(
        r#"
        UPDATE oauth_grants
        SET secret_hash = $2,
            authorized_at = NOW(),
            code_challenge = NULL,
            code_challenge_method = NULL
        WHERE id = $1 AND authorized_at IS NULL
        RETURNING authorized_at
        "#,
    )
    .bind(id.0)
    .bind(token_hash)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|(at,)| at)
        .ok_or_else(|| StorageError::not_found(format!("pending grant {id}")))
}

/// Delete a locked pending grant.
pub(crate) async fn delete_locked(tx: &mut PgTransaction<'static>, id: GrantId) -> StorageResult<()> {
    query("DELETE FROM oauth_grants WHERE id = $1")
        .bind(id.0)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_auth::types::Scope;

    fn row() -> GrantRow {
        GrantRow {
            id: Uuid::new_v4(),
            user_id: 7,
            application_id: Uuid::new_v4(),
            secret_hash: "hash".into(),
            scopes: vec!["write_api".into(), "read_prefs".into()],
            redirect_uri: Some("https://client.example/cb".into()),
            code_challenge: None,
            code_challenge_method: None,
            authorized_at: None,
            pat_name: None,
            pat_preview: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_pending_row() {
        let mut pending = row();
        pending.code_challenge = Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into());
        pending.code_challenge_method = Some("S256".into());

        let grant = pending.into_grant().unwrap();
        assert!(grant.is_pending());
        assert_eq!(grant.challenge().unwrap().method, PkceMethod::S256);
        assert_eq!(
            grant.scopes,
            ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi])
        );
    }

    #[test]
    fn test_active_pat_row() {
        let mut active = row();
        active.authorized_at = Some(OffsetDateTime::now_utc());
        active.pat_name = Some("laptop".into());
        active.pat_preview = Some("abcdefg".into());

        let grant = active.into_grant().unwrap();
        assert!(grant.is_active());
        assert_eq!(grant.pat_summary().unwrap().preview, "abcdefg");
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let mut unpaired = row();
        unpaired.code_challenge = Some("abc".into());
        assert!(matches!(
            unpaired.into_grant(),
            Err(StorageError::Serialization(_))
        ));

        let mut bad_method = row();
        bad_method.code_challenge = Some("abc".into());
        bad_method.code_challenge_method = Some("S512".into());
        assert!(bad_method.into_grant().is_err());

        let mut bad_scope = row();
        bad_scope.scopes.push("write_everything".into());
        assert!(bad_scope.into_grant().is_err());
    }
}
