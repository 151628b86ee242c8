//! Grants: pending authorization codes and active access tokens.
//!
//! A grant is created either Pending (by the code issuer) or directly
//! Active (personal access tokens and system-app tokens). Promotion from
//! Pending to Active keeps the grant's identity; it never creates a second
//! grant.

use serde::Serialize;
use time::OffsetDateTime;

use super::{ApplicationId, GrantId, ScopeSet, UserId};
use crate::oauth::pkce::PkceChallenge;

/// Lifecycle state of a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantState {
    /// An authorization code waiting to be exchanged.
    Pending {
        /// PKCE challenge registered with the authorization request.
        challenge: Option<PkceChallenge>,
    },
    /// A usable access token.
    Active {
        authorized_at: OffsetDateTime,
    },
}

/// Label attached to personal access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatLabel {
    pub name: String,
    /// Leading characters of the secret, kept in clear text.
    pub preview: String,
}

/// One row of the grant table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub id: GrantId,
    pub user_id: UserId,
    pub application_id: ApplicationId,

    /// One-way hash of the code (Pending) or access token (Active).
    pub secret_hash: String,

    pub scopes: ScopeSet,

    /// Redirect URI of the authorization request. `None` for grants that
    /// were never issued through the authorize endpoint.
    pub redirect_uri: Option<String>,

    pub state: GrantState,

    pub pat: Option<PatLabel>,

    pub created_at: OffsetDateTime,
}

impl Grant {
    /// Creates a pending grant for a freshly minted authorization code.
    #[must_use]
    pub fn pending(
        user_id: UserId,
        application_id: ApplicationId,
        code_hash: String,
        scopes: ScopeSet,
        redirect_uri: String,
        challenge: Option<PkceChallenge>,
    ) -> Self {
        Self {
            id: GrantId::new(),
            user_id,
            application_id,
            secret_hash: code_hash,
            scopes,
            redirect_uri: Some(redirect_uri),
            state: GrantState::Pending { challenge },
            pat: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Creates an already active grant, bypassing the code exchange.
    #[must_use]
    pub fn active(
        user_id: UserId,
        application_id: ApplicationId,
        token_hash: String,
        scopes: ScopeSet,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: GrantId::new(),
            user_id,
            application_id,
            secret_hash: token_hash,
            scopes,
            redirect_uri: None,
            state: GrantState::Active { authorized_at: now },
            pat: None,
            created_at: now,
        }
    }

    #[must_use]
    pub fn with_pat_label(mut self, name: impl Into<String>, preview: impl Into<String>) -> Self {
        self.pat = Some(PatLabel {
            name: name.into(),
            preview: preview.into(),
        });
        self
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, GrantState::Pending { .. })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, GrantState::Active { .. })
    }

    #[must_use]
    pub fn authorized_at(&self) -> Option<OffsetDateTime> {
        match self.state {
            GrantState::Active { authorized_at } => Some(authorized_at),
            GrantState::Pending { .. } => None,
        }
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&PkceChallenge> {
        match &self.state {
            GrantState::Pending { challenge } => challenge.as_ref(),
            GrantState::Active { .. } => None,
        }
    }

    /// Turns a pending grant into an active one in place: swaps the secret
    /// hash and drops the PKCE challenge.
    pub fn promote(&mut self, token_hash: String, authorized_at: OffsetDateTime) {
        self.secret_hash = token_hash;
        self.state = GrantState::Active { authorized_at };
    }
}

/// Listing view of a personal access token. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatSummary {
    pub id: GrantId,
    pub name: String,
    pub preview: String,
    pub scopes: ScopeSet,
    #[serde(with = "time::serde::rfc3339::option")]
    pub authorized_at: Option<OffsetDateTime>,
}

impl Grant {
    /// Listing view, if this grant is a personal access token.
    #[must_use]
    pub fn pat_summary(&self) -> Option<PatSummary> {
        self.pat.as_ref().map(|label| PatSummary {
            id: self.id,
            name: label.name.clone(),
            preview: label.preview.clone(),
            scopes: self.scopes.clone(),
            authorized_at: self.authorized_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::pkce::{PkceChallenge, PkceMethod};
    use crate::types::Scope;

    #[test]
    fn test_promote_keeps_identity() {
        let mut grant = Grant::pending(
            UserId(7),
            ApplicationId::new(),
            "code-hash".into(),
            ScopeSet::from([Scope::ReadPrefs]),
            "https://client.example/cb".into(),
            Some(PkceChallenge::new(PkceMethod::Plain, "abc")),
        );
        let id = grant.id;
        assert!(grant.is_pending());
        assert!(grant.challenge().is_some());

        let now = OffsetDateTime::now_utc();
        grant.promote("token-hash".into(), now);

        assert_eq!(grant.id, id);
        assert!(grant.is_active());
        assert_eq!(grant.authorized_at(), Some(now));
        assert_eq!(grant.secret_hash, "token-hash");
        assert!(grant.challenge().is_none());
        assert_eq!(grant.redirect_uri.as_deref(), Some("https://client.example/cb"));
    }

    #[test]
    fn test_pat_summary_only_for_labelled_grants() {
        let grant = Grant::active(UserId(1), ApplicationId::new(), "h".into(), ScopeSet::public());
        assert!(grant.pat_summary().is_none());

        let grant = grant.with_pat_label("laptop", "AbCdEfG");
        let summary = grant.pat_summary().unwrap();
        assert_eq!(summary.name, "laptop");
        assert_eq!(summary.preview, "AbCdEfG");
    }
}
