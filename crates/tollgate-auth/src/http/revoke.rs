//! Revocation endpoint handler.
//!
//! ```text
//! POST /oauth2/revoke
//! Content-Type: application/x-www-form-urlencoded
//!
//! token=<access_token>          revoke by possession of the token
//! id=<grant id>                 revoke one of the acting user's grants
//! ```
//!
//! Like RFC 7009, revoking something that does not exist still answers
//! `200 OK`.

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::AuthState;
use crate::error::AuthError;
use crate::types::GrantId;

/// Revocation form. Exactly one of `token` and `id` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevocationForm {
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub id: Option<Uuid>,

    /// Accepted for RFC 7009 compatibility. Only access tokens exist here.
    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// `POST /oauth2/revoke`
pub async fn revoke_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(form): Form<RevocationForm>,
) -> Response {
    match revoke(&state, &headers, form).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn revoke(state: &AuthState, headers: &HeaderMap, form: RevocationForm) -> Result<(), AuthError> {
    let token = form.token.filter(|t| !t.is_empty());
    match (token, form.id) {
        (Some(token), None) => state.revocation.revoke_by_access_token(&token).await,
        (None, Some(id)) => {
            let user_id = state.identity.verify(headers).await?;
            state.revocation.revoke_by_id(user_id, GrantId(id)).await
        }
        _ => Err(AuthError::invalid_request(
            "exactly one of 'token' and 'id' is required",
        )),
    }
}
