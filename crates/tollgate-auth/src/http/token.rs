//! Token endpoint handler.
//!
//! ```text
//! POST /oauth2/token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_id:client_secret>     (confidential clients, optional)
//!
//! grant_type=authorization_code&code=..&code_verifier=..&redirect_uri=..&client_id=..
//! ```

use axum::Json;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use base64::{Engine, engine::general_purpose::STANDARD};

use super::AuthState;
use crate::error::AuthError;
use crate::oauth::exchange::{ClientCredentials, ExchangeRequest, TokenRequest};

/// `POST /oauth2/token`
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(form): Form<TokenRequest>,
) -> Response {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    let request = match ExchangeRequest::from_token_request(form, basic) {
        Ok(request) => request,
        Err(e) => return AuthError::from(e).into_response(),
    };

    match state.exchanger.exchange(&request).await {
        Ok(token) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            (headers, Json(token)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Parses `Basic <base64(client_id:client_secret)>`.
///
/// Returns `None` for any other scheme or a malformed value.
pub fn parse_basic_auth(value: &str) -> Option<ClientCredentials> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, secret) = decoded.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }
    Some(ClientCredentials::confidential(client_id, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_auth() {
        let value = format!("Basic {}", STANDARD.encode("client-1:s3cr:et"));
        assert_eq!(
            parse_basic_auth(&value),
            Some(ClientCredentials::confidential("client-1", "s3cr:et"))
        );

        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic not-base64!"), None);
        let no_colon = format!("Basic {}", STANDARD.encode("client-1"));
        assert_eq!(parse_basic_auth(&no_colon), None);
        let no_id = format!("Basic {}", STANDARD.encode(":secret"));
        assert_eq!(parse_basic_auth(&no_id), None);
    }
}
