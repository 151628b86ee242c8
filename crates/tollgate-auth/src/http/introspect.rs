//! Token introspection endpoint handler.
//!
//! Meant for resource servers on the internal network. The response is
//! `{"active": false}` for anything that is not a live access token.

use axum::Json;
use axum::extract::{Form, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AuthState;
use crate::error::AuthError;

#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionForm {
    pub token: String,

    #[serde(default)]
    pub token_type_hint: Option<String>,
}

/// `POST /oauth2/introspect`
pub async fn introspect_handler(
    State(state): State<AuthState>,
    Form(form): Form<IntrospectionForm>,
) -> Response {
    if form.token.is_empty() {
        return AuthError::invalid_request("missing required 'token' parameter").into_response();
    }

    match state.lookup.introspect(&form.token).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => e.into_response(),
    }
}
