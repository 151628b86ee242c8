//! Expired authorization code sweeping.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::storage::TokenStore;

/// Deletes pending codes older than the authorization code timeout.
/// Active grants are never touched.
pub struct ExpiredCodeReaper {
    store: Arc<dyn TokenStore>,
    code_timeout: Duration,
}

impl ExpiredCodeReaper {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, code_timeout: Duration) -> Self {
        Self {
            store,
            code_timeout,
        }
    }

    /// Runs one sweep now. Returns the number of deleted codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn sweep(&self) -> AuthResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - self.code_timeout;
        let deleted = self.store.delete_pending_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "Deleted expired authorization codes");
        } else {
            debug!("No expired authorization codes");
        }
        Ok(deleted)
    }

    /// Sweeps every `interval` until `shutdown` flips to `true`.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, retryable = e.is_retryable(), "Expired code sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Expired code reaper stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{RandomSecretGenerator, SecretHasher, Sha256Hasher};
    use crate::error::{AuthError, GrantError};
    use crate::oauth::exchange::{ClientCredentials, CodeExchanger, ExchangeRequest};
    use crate::storage::{ApplicationRegistry, MemoryStorage};
    use crate::types::{Application, Grant, ScopeSet, UserId};

    const TIMEOUT: Duration = Duration::from_secs(180);
    const REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

    async fn pending(store: &MemoryStorage, app: &Application, code: &str, age: Duration) {
        let mut grant = Grant::pending(
            UserId(1),
            app.id,
            Sha256Hasher.hash(code),
            ScopeSet::new(),
            REDIRECT.into(),
            None,
        );
        grant.created_at = OffsetDateTime::now_utc() - age;
        store.insert(&grant).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_pending_codes() {
        let store = Arc::new(MemoryStorage::new());
        let app = Application::new(
            Some(UserId(3)),
            "Client",
            "client-1",
            ScopeSet::new(),
            vec![REDIRECT.into()],
        );
        let app = store.upsert(&app).await.unwrap();

        pending(&store, &app, "old", Duration::from_secs(600)).await;
        pending(&store, &app, "young", Duration::from_secs(10)).await;
        let mut old_token = Grant::active(UserId(1), app.id, "tok".into(), ScopeSet::new());
        old_token.created_at = OffsetDateTime::now_utc() - Duration::from_secs(86_400);
        store.insert(&old_token).await.unwrap();

        let reaper = ExpiredCodeReaper::new(store.clone(), TIMEOUT);
        assert_eq!(reaper.sweep().await.unwrap(), 1);
        assert_eq!(store.grant_count().await, 2);

        let exchanger = CodeExchanger::new(
            store.clone(),
            store.clone(),
            Arc::new(Sha256Hasher),
            Arc::new(RandomSecretGenerator),
            TIMEOUT,
        );
        let exchange = |code: &str| ExchangeRequest {
            client: ClientCredentials::public("client-1"),
            code: code.to_string(),
            code_verifier: None,
            redirect_uri: REDIRECT.to_string(),
        };

        let err = exchanger.exchange(&exchange("old")).await.unwrap_err();
        assert!(matches!(err, AuthError::Grant(GrantError::NotFoundOrUsed)));
        assert!(exchanger.exchange(&exchange("young")).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStorage::new());
        let reaper = ExpiredCodeReaper::new(store, TIMEOUT);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(reaper.run(Duration::from_millis(10), rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
