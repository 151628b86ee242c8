//! OpenID discovery document.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;

use super::{AUTHORIZE_PATH, AuthState, INTROSPECT_PATH, REVOKE_PATH, TOKEN_PATH};
use crate::config::AuthConfig;
use crate::types::Scope;

/// Server metadata advertised at `/.well-known/openid-configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub scopes_supported: Vec<&'static str>,
    pub response_types_supported: Vec<&'static str>,
    pub response_modes_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
}

impl DiscoveryDocument {
    /// Builds the document for the configured issuer. Private scopes are
    /// not advertised.
    #[must_use]
    pub fn build(config: &AuthConfig) -> Self {
        let base = config.issuer.trim_end_matches('/');
        let endpoint = |path: &str| format!("{base}{path}");

        Self {
            issuer: base.to_string(),
            authorization_endpoint: endpoint(AUTHORIZE_PATH),
            token_endpoint: endpoint(TOKEN_PATH),
            revocation_endpoint: endpoint(REVOKE_PATH),
            introspection_endpoint: endpoint(INTROSPECT_PATH),
            scopes_supported: Scope::ALL
                .into_iter()
                .filter(|s| !s.is_private())
                .map(Scope::as_str)
                .collect(),
            response_types_supported: vec!["code"],
            response_modes_supported: vec!["query", "fragment", "form_post"],
            grant_types_supported: vec!["authorization_code"],
            code_challenge_methods_supported: vec!["plain", "S256"],
            token_endpoint_auth_methods_supported: vec![
                "none",
                "client_secret_post",
                "client_secret_basic",
            ],
        }
    }
}

/// `GET /.well-known/openid-configuration`
pub async fn openid_configuration_handler(State(state): State<AuthState>) -> impl IntoResponse {
    Json(DiscoveryDocument::build(&state.config))
}
