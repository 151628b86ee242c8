//! Authorization endpoint handlers.
//!
//! ```text
//! GET /oauth2/authorize?client_id=..&redirect_uri=..&response_type=code&scope=..
//!   ├─► equivalent prior grant → code delivered (redirect / form_post / OOB page)
//!   └─► otherwise              → consent form
//!
//! POST /oauth2/authorize   (consent form submitted)
//!   └─► code delivered
//! ```
//!
//! Both legs require an authenticated user, confirmed through the
//! configured [`IdentityVerifier`](super::IdentityVerifier).

use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::AuthState;
use super::templates::{render_consent, render_form_post, render_out_of_band};
use crate::oauth::authorize::{AuthorizationRequest, AuthorizeOutcome, CodeDelivery};
use crate::oauth::service::AuthorizeMode;

/// `GET /oauth2/authorize`
pub async fn authorize_get(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    handle(&state, &headers, request, AuthorizeMode::Init).await
}

/// `POST /oauth2/authorize`, submitted from the consent form.
pub async fn authorize_post(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(request): Form<AuthorizationRequest>,
) -> Response {
    handle(&state, &headers, request, AuthorizeMode::Consented).await
}

async fn handle(
    state: &AuthState,
    headers: &HeaderMap,
    request: AuthorizationRequest,
    mode: AuthorizeMode,
) -> Response {
    let user_id = match state.identity.verify(headers).await {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    match state.authorization.authorize(user_id, &request, mode).await {
        Ok(AuthorizeOutcome::Issued(delivery)) => deliver(delivery),
        Ok(AuthorizeOutcome::ConsentRequired(prompt)) => {
            Html(render_consent(&prompt, &request)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn deliver(delivery: CodeDelivery) -> Response {
    match delivery {
        CodeDelivery::Redirect { location } => Redirect::to(&location).into_response(),
        CodeDelivery::FormPost {
            action,
            code,
            state,
        } => Html(render_form_post(&action, &code, state.as_deref())).into_response(),
        CodeDelivery::OutOfBand { display } => Html(render_out_of_band(&display)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{StatusCode, header};

    #[test]
    fn test_deliver_redirect() {
        let response = deliver(CodeDelivery::Redirect {
            location: "https://client.example/cb?code=abc".into(),
        });
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://client.example/cb?code=abc"
        );
    }

    #[test]
    fn test_deliver_pages() {
        let response = deliver(CodeDelivery::OutOfBand {
            display: "abc#xyz".into(),
        });
        assert_eq!(response.status(), StatusCode::OK);

        let response = deliver(CodeDelivery::FormPost {
            action: "https://client.example/cb".into(),
            code: "abc".into(),
            state: None,
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
    }
}
