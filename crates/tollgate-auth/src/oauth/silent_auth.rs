//! Silent re-authentication.
//!
//! On a first-touch authorization request the user is not asked to consent
//! again if they already hold an equivalent active grant: same redirect URI
//! and exactly the same scope set. Only the `limit` most recent grants are
//! inspected.

use std::sync::Arc;

use tracing::debug;

use crate::AuthResult;
use crate::oauth::authorize::{ConsentPrompt, ValidatedAuthorization};
use crate::storage::TokenStore;
use crate::types::{GrantId, UserId};

/// Outcome of a silent authentication check. A miss is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SilentAuthDecision {
    /// An equivalent grant exists; issue a code without asking.
    Approved { matched: GrantId },
    /// Ask the user.
    ConsentRequired(ConsentPrompt),
}

/// Bounded search for an equivalent prior grant.
pub struct SilentAuthChecker {
    store: Arc<dyn TokenStore>,
    limit: usize,
}

impl SilentAuthChecker {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Looks for a prior grant matching `request` among the user's most
    /// recent active grants for the application.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn check(
        &self,
        user_id: UserId,
        request: &ValidatedAuthorization,
    ) -> AuthResult<SilentAuthDecision> {
        let grants = self
            .store
            .find_recent_active(user_id, request.application.id, self.limit)
            .await?;

        let matched = grants.iter().find(|grant| {
            grant.redirect_uri.as_deref() == Some(request.redirect_uri.as_str())
                && grant.scopes == request.scopes
        });

        if let Some(grant) = matched {
            debug!(
                user_id = %user_id,
                client_id = %request.application.client_id,
                grant_id = %grant.id,
                "Found equivalent grant, skipping consent"
            );
            return Ok(SilentAuthDecision::Approved { matched: grant.id });
        }

        debug!(
            user_id = %user_id,
            client_id = %request.application.client_id,
            inspected = grants.len(),
            "No equivalent grant, consent required"
        );
        Ok(SilentAuthDecision::ConsentRequired(ConsentPrompt {
            application: request.application.public_info(),
            scopes: request.scopes.clone(),
            redirect_uri: request.redirect_uri.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::authorize::ResponseMode;
    use crate::storage::MemoryStorage;
    use crate::types::{Application, Grant, Scope, ScopeSet};

    const REDIRECT: &str = "https://client.example/cb";

    fn app() -> Application {
        Application::new(
            Some(UserId(99)),
            "Client",
            "client-1",
            ScopeSet::public(),
            vec![REDIRECT.to_string(), "https://client.example/other".to_string()],
        )
    }

    fn request(app: &Application, redirect: &str, scopes: ScopeSet) -> ValidatedAuthorization {
        ValidatedAuthorization {
            application: app.clone(),
            redirect_uri: redirect.to_string(),
            scopes,
            response_mode: ResponseMode::Query,
            challenge: None,
            state: None,
        }
    }

    async fn store_with_grant(app: &Application, scopes: ScopeSet) -> Arc<MemoryStorage> {
        let store = Arc::new(MemoryStorage::new());
        let mut grant = Grant::active(UserId(1), app.id, "token".into(), scopes);
        grant.redirect_uri = Some(REDIRECT.to_string());
        store.insert(&grant).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_exact_match_skips_consent() {
        let app = app();
        let ab = ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]);
        let store = store_with_grant(&app, ab.clone()).await;
        let checker = SilentAuthChecker::new(store, 10);

        let decision = checker
            .check(UserId(1), &request(&app, REDIRECT, ab))
            .await
            .unwrap();
        assert!(matches!(decision, SilentAuthDecision::Approved { .. }));
    }

    #[tokio::test]
    async fn test_subset_and_superset_require_consent() {
        let app = app();
        let ab = ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]);
        let store = store_with_grant(&app, ab).await;
        let checker = SilentAuthChecker::new(store, 10);

        for scopes in [
            ScopeSet::from([Scope::ReadPrefs]),
            ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi, Scope::WriteNotes]),
        ] {
            let decision = checker
                .check(UserId(1), &request(&app, REDIRECT, scopes))
                .await
                .unwrap();
            assert!(matches!(decision, SilentAuthDecision::ConsentRequired(_)));
        }
    }

    #[tokio::test]
    async fn test_different_redirect_or_user_requires_consent() {
        let app = app();
        let ab = ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]);
        let store = store_with_grant(&app, ab.clone()).await;
        let checker = SilentAuthChecker::new(store, 10);

        let decision = checker
            .check(
                UserId(1),
                &request(&app, "https://client.example/other", ab.clone()),
            )
            .await
            .unwrap();
        let SilentAuthDecision::ConsentRequired(prompt) = decision else {
            panic!("expected consent prompt");
        };
        assert_eq!(prompt.application.client_id, "client-1");

        let decision = checker
            .check(UserId(2), &request(&app, REDIRECT, ab))
            .await
            .unwrap();
        assert!(matches!(decision, SilentAuthDecision::ConsentRequired(_)));
    }

    #[tokio::test]
    async fn test_search_is_bounded() {
        let app = app();
        let store = Arc::new(MemoryStorage::new());
        let wanted = ScopeSet::from([Scope::ReadGpx]);

        let mut old = Grant::active(UserId(1), app.id, "old".into(), wanted.clone());
        old.redirect_uri = Some(REDIRECT.to_string());
        old.state = crate::types::GrantState::Active {
            authorized_at: time::OffsetDateTime::now_utc() - time::Duration::hours(1),
        };
        store.insert(&old).await.unwrap();

        for i in 0..3 {
            let mut newer =
                Grant::active(UserId(1), app.id, format!("new-{i}"), ScopeSet::from([Scope::ReadPrefs]));
            newer.redirect_uri = Some(REDIRECT.to_string());
            store.insert(&newer).await.unwrap();
        }

        let bounded = SilentAuthChecker::new(store.clone(), 3);
        let decision = bounded
            .check(UserId(1), &request(&app, REDIRECT, wanted.clone()))
            .await
            .unwrap();
        assert!(matches!(decision, SilentAuthDecision::ConsentRequired(_)));

        let wider = SilentAuthChecker::new(store, 10);
        let decision = wider
            .check(UserId(1), &request(&app, REDIRECT, wanted))
            .await
            .unwrap();
        assert!(matches!(decision, SilentAuthDecision::Approved { .. }));
    }
}
