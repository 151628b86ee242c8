//! Authorization endpoint request and response types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::oauth::pkce::PkceChallenge;
use crate::types::{Application, ApplicationInfo, ScopeSet};

/// Raw authorization request parameters.
///
/// Accepted as a query string on `GET /oauth2/authorize` and as a form body
/// on `POST /oauth2/authorize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    /// Space-delimited scopes.
    #[serde(default)]
    pub scope: String,
    pub response_type: String,
    #[serde(default)]
    pub response_mode: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
    /// Opaque client state, passed through untouched.
    #[serde(default)]
    pub state: Option<String>,
}

/// How the authorization response reaches the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Parameters appended to the redirect URI's query string.
    #[default]
    Query,
    /// Parameters placed in the redirect URI's fragment.
    Fragment,
    /// Parameters POSTed to the redirect URI by an auto-submitting form.
    FormPost,
}

impl FromStr for ResponseMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "fragment" => Ok(Self::Fragment),
            "form_post" => Ok(Self::FormPost),
            other => Err(ClientError::UnsupportedResponseMode(other.to_string())),
        }
    }
}

/// An authorization request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    pub application: Application,
    pub redirect_uri: String,
    pub scopes: ScopeSet,
    pub response_mode: ResponseMode,
    pub challenge: Option<PkceChallenge>,
    pub state: Option<String>,
}

/// How a freshly issued code is handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeDelivery {
    /// HTTP redirect to `location`.
    Redirect { location: String },
    /// Auto-submitting form POSTing `code` and `state` to `action`.
    FormPost {
        action: String,
        code: String,
        state: Option<String>,
    },
    /// Out-of-band: show `display` to the user. It is the code, followed by
    /// `#state` when a state was supplied.
    OutOfBand { display: String },
}

impl CodeDelivery {
    /// Builds the delivery for a code issued to a redirect endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::BadRedirectUri` if the registered redirect URI
    /// is not an absolute URL.
    pub fn redirect(
        redirect_uri: &str,
        mode: ResponseMode,
        code: &str,
        state: Option<&str>,
    ) -> Result<Self, ClientError> {
        let mut url = url::Url::parse(redirect_uri).map_err(|_| ClientError::BadRedirectUri)?;
        match mode {
            ResponseMode::Query => {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("code", code);
                if let Some(state) = state {
                    pairs.append_pair("state", state);
                }
            }
            ResponseMode::Fragment => {
                let mut fragment = url::form_urlencoded::Serializer::new(String::new());
                fragment.append_pair("code", code);
                if let Some(state) = state {
                    fragment.append_pair("state", state);
                }
                url.set_fragment(Some(&fragment.finish()));
            }
            ResponseMode::FormPost => {
                return Ok(Self::FormPost {
                    action: redirect_uri.to_string(),
                    code: code.to_string(),
                    state: state.map(str::to_string),
                });
            }
        }
        Ok(Self::Redirect {
            location: url.to_string(),
        })
    }

    /// Builds the out-of-band delivery.
    #[must_use]
    pub fn out_of_band(code: &str, state: Option<&str>) -> Self {
        let display = match state {
            Some(state) => format!("{code}#{state}"),
            None => code.to_string(),
        };
        Self::OutOfBand { display }
    }
}

/// Returned instead of a code when the user must approve the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentPrompt {
    pub application: ApplicationInfo,
    /// Scopes being requested, sorted.
    pub scopes: ScopeSet,
    pub redirect_uri: String,
}

/// Result of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// A code was issued.
    Issued(CodeDelivery),
    /// No equivalent prior grant was found; the user has to consent.
    ConsentRequired(ConsentPrompt),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_delivery() {
        let delivery = CodeDelivery::redirect(
            "https://client.example/cb",
            ResponseMode::Query,
            "abc123",
            None,
        )
        .unwrap();
        assert_eq!(
            delivery,
            CodeDelivery::Redirect {
                location: "https://client.example/cb?code=abc123".into()
            }
        );
    }

    #[test]
    fn test_query_delivery_keeps_existing_query_and_encodes_state() {
        let delivery = CodeDelivery::redirect(
            "https://client.example/cb?tenant=1",
            ResponseMode::Query,
            "abc",
            Some("a b&c"),
        )
        .unwrap();
        let CodeDelivery::Redirect { location } = delivery else {
            panic!("expected redirect");
        };
        assert_eq!(
            location,
            "https://client.example/cb?tenant=1&code=abc&state=a+b%26c"
        );
    }

    #[test]
    fn test_fragment_delivery() {
        let delivery = CodeDelivery::redirect(
            "https://client.example/cb",
            ResponseMode::Fragment,
            "abc",
            Some("xyz"),
        )
        .unwrap();
        assert_eq!(
            delivery,
            CodeDelivery::Redirect {
                location: "https://client.example/cb#code=abc&state=xyz".into()
            }
        );
    }

    #[test]
    fn test_form_post_delivery() {
        let delivery = CodeDelivery::redirect(
            "https://client.example/cb",
            ResponseMode::FormPost,
            "abc",
            Some("xyz"),
        )
        .unwrap();
        assert!(matches!(delivery, CodeDelivery::FormPost { ref action, .. } if action == "https://client.example/cb"));
    }

    #[test]
    fn test_out_of_band_appends_state() {
        assert_eq!(
            CodeDelivery::out_of_band("abc", Some("xyz")),
            CodeDelivery::OutOfBand {
                display: "abc#xyz".into()
            }
        );
        assert_eq!(
            CodeDelivery::out_of_band("abc", None),
            CodeDelivery::OutOfBand {
                display: "abc".into()
            }
        );
    }

    #[test]
    fn test_response_mode_parse() {
        assert_eq!("fragment".parse::<ResponseMode>().unwrap(), ResponseMode::Fragment);
        assert_eq!(
            "web_message".parse::<ResponseMode>(),
            Err(ClientError::UnsupportedResponseMode("web_message".into()))
        );
    }
}
