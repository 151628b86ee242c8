//! Authorization code issuance.

use std::sync::Arc;

use tracing::info;

use crate::AuthResult;
use crate::crypto::{SecretGenerator, SecretHasher};
use crate::oauth::authorize::{CodeDelivery, ValidatedAuthorization};
use crate::storage::TokenStore;
use crate::types::{Grant, UserId, is_oob_redirect_uri};

/// Mints authorization codes and stores them as pending grants.
pub struct AuthorizationCodeIssuer {
    store: Arc<dyn TokenStore>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn SecretGenerator>,
}

impl AuthorizationCodeIssuer {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn SecretGenerator>,
    ) -> Self {
        Self {
            store,
            hasher,
            generator,
        }
    }

    /// Issues a code for an approved request.
    ///
    /// Only the hash of the code is stored. The plaintext code leaves this
    /// function inside the returned delivery and nowhere else.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails or the registered redirect URI
    /// cannot carry parameters.
    pub async fn issue(
        &self,
        user_id: UserId,
        request: &ValidatedAuthorization,
    ) -> AuthResult<CodeDelivery> {
        let code = self.generator.generate();
        let grant = Grant::pending(
            user_id,
            request.application.id,
            self.hasher.hash(&code),
            request.scopes.clone(),
            request.redirect_uri.clone(),
            request.challenge.clone(),
        );

        let delivery = if is_oob_redirect_uri(&request.redirect_uri) {
            CodeDelivery::out_of_band(&code, request.state.as_deref())
        } else {
            CodeDelivery::redirect(
                &request.redirect_uri,
                request.response_mode,
                &code,
                request.state.as_deref(),
            )?
        };

        self.store.insert(&grant).await?;

        info!(
            user_id = %user_id,
            client_id = %request.application.client_id,
            grant_id = %grant.id,
            scope = %request.scopes,
            pkce = request.challenge.is_some(),
            "Authorization code issued"
        );

        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{RandomSecretGenerator, Sha256Hasher};
    use crate::oauth::authorize::ResponseMode;
    use crate::storage::MemoryStorage;
    use crate::types::{Application, Scope, ScopeSet};

    struct FixedGenerator(&'static str);

    impl SecretGenerator for FixedGenerator {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    fn request(redirect: &str, state: Option<&str>) -> ValidatedAuthorization {
        let app = Application::new(
            Some(UserId(5)),
            "Client",
            "client-1",
            ScopeSet::from([Scope::ReadPrefs]),
            vec![redirect.to_string()],
        );
        ValidatedAuthorization {
            application: app,
            redirect_uri: redirect.to_string(),
            scopes: ScopeSet::from([Scope::ReadPrefs]),
            response_mode: ResponseMode::Query,
            challenge: None,
            state: state.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_stores_only_the_hash() {
        let store = Arc::new(MemoryStorage::new());
        let issuer = AuthorizationCodeIssuer::new(
            store.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(FixedGenerator("abc123")),
        );

        let delivery = issuer
            .issue(UserId(1), &request("https://client.example/cb", None))
            .await
            .unwrap();
        assert_eq!(
            delivery,
            CodeDelivery::Redirect {
                location: "https://client.example/cb?code=abc123".into()
            }
        );

        let since = time::OffsetDateTime::now_utc() - time::Duration::minutes(1);
        assert!(store.begin_exchange("abc123", since).await.unwrap().is_none());
        let hash = Sha256Hasher.hash("abc123");
        let lock = store.begin_exchange(&hash, since).await.unwrap().unwrap();
        assert_eq!(lock.grant().user_id, UserId(1));
    }

    #[tokio::test]
    async fn test_oob_returns_code_with_state() {
        let store = Arc::new(MemoryStorage::new());
        let issuer = AuthorizationCodeIssuer::new(
            store.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(FixedGenerator("abc123")),
        );

        let delivery = issuer
            .issue(
                UserId(1),
                &request("urn:ietf:wg:oauth:2.0:oob:auto", Some("s1")),
            )
            .await
            .unwrap();
        assert_eq!(
            delivery,
            CodeDelivery::OutOfBand {
                display: "abc123#s1".into()
            }
        );
        assert_eq!(store.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_codes_are_distinct() {
        let store = Arc::new(MemoryStorage::new());
        let issuer = AuthorizationCodeIssuer::new(
            store.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(RandomSecretGenerator),
        );
        let req = request("urn:ietf:wg:oauth:2.0:oob", None);
        let a = issuer.issue(UserId(1), &req).await.unwrap();
        let b = issuer.issue(UserId(1), &req).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.grant_count().await, 2);
    }
}
