//! Registered client applications.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{ApplicationId, ScopeSet, UserId};

/// Reserved redirect URIs selecting out-of-band delivery: the code is
/// shown to the user instead of being sent to a redirect endpoint.
pub const OOB_REDIRECT_URIS: [&str; 2] = ["urn:ietf:wg:oauth:2.0:oob", "urn:ietf:wg:oauth:2.0:oob:auto"];

/// Returns `true` if `uri` is one of the out-of-band sentinels.
#[must_use]
pub fn is_oob_redirect_uri(uri: &str) -> bool {
    OOB_REDIRECT_URIS.contains(&uri)
}

/// A client application allowed to request authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,

    /// Owning user. `None` marks a system application.
    pub owner: Option<UserId>,

    /// Display name shown on the consent screen.
    pub name: String,

    /// Public client identifier. Unique.
    pub client_id: String,

    /// Hash of the client secret. Present only for confidential clients.
    #[serde(skip_serializing)]
    pub secret_hash: Option<String>,

    /// Scopes the application may request.
    pub scopes: ScopeSet,

    /// Exact redirect URIs the application may use.
    pub redirect_uris: Vec<String>,

    /// Whether the application must authenticate at the token endpoint.
    pub confidential: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Application {
    /// Creates a public (non-confidential) application.
    #[must_use]
    pub fn new(
        owner: Option<UserId>,
        name: impl Into<String>,
        client_id: impl Into<String>,
        scopes: ScopeSet,
        redirect_uris: Vec<String>,
    ) -> Self {
        Self {
            id: ApplicationId::new(),
            owner,
            name: name.into(),
            client_id: client_id.into(),
            secret_hash: None,
            scopes,
            redirect_uris,
            confidential: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Makes the application confidential with the given secret hash.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.secret_hash = Some(hash.into());
        self.confidential = true;
        self
    }

    /// System applications have no owner.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.owner.is_none()
    }

    /// Exact membership test; no prefix or partial matching.
    #[must_use]
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Metadata safe to show on the consent screen.
    #[must_use]
    pub fn public_info(&self) -> ApplicationInfo {
        ApplicationInfo {
            client_id: self.client_id.clone(),
            name: self.name.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

/// Public application metadata for the consent screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationInfo {
    pub client_id: String,
    pub name: String,
    pub scopes: ScopeSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scope;

    #[test]
    fn test_redirect_uri_requires_exact_match() {
        let app = Application::new(
            Some(UserId(1)),
            "Example",
            "client-1",
            ScopeSet::from([Scope::ReadPrefs]),
            vec!["https://client.example/cb".to_string()],
        );
        assert!(app.allows_redirect_uri("https://client.example/cb"));
        assert!(!app.allows_redirect_uri("https://client.example/cb/extra"));
        assert!(!app.allows_redirect_uri("https://client.example/"));
        assert!(!app.allows_redirect_uri("https://client.example/cb?x=1"));
    }

    #[test]
    fn test_oob_sentinels() {
        assert!(is_oob_redirect_uri("urn:ietf:wg:oauth:2.0:oob"));
        assert!(is_oob_redirect_uri("urn:ietf:wg:oauth:2.0:oob:auto"));
        assert!(!is_oob_redirect_uri("urn:ietf:wg:oauth:2.0:oob:other"));
    }

    #[test]
    fn test_confidential_and_system_flags() {
        let app = Application::new(None, "Web", "SystemApp.web", ScopeSet::new(), vec![]);
        assert!(app.is_system());
        assert!(!app.confidential);

        let app = app.with_secret_hash("hash");
        assert!(app.confidential);
    }
}
