//! Authorization request validation.
//!
//! Pure checks over an already loaded application; no storage access and
//! no side effects.

use crate::config::OAuthConfig;
use crate::error::ClientError;
use crate::oauth::authorize::{AuthorizationRequest, ResponseMode, ValidatedAuthorization};
use crate::oauth::pkce::{PkceChallenge, PkceMethod};
use crate::types::{Application, ScopeSet};

/// Validates authorization requests against the application registry.
#[derive(Debug, Clone)]
pub struct AuthorizationRequestValidator {
    code_challenge_max_length: usize,
}

impl AuthorizationRequestValidator {
    #[must_use]
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            code_challenge_max_length: config.code_challenge_max_length,
        }
    }

    /// Validates `request` against `application`, the record registered
    /// under `request.client_id` (if any).
    ///
    /// Checks run in order: client, redirect URI, scopes, response type,
    /// response mode, PKCE parameters. Requested scopes are never narrowed;
    /// any scope outside the application's allowance fails the request.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ClientError`].
    pub fn validate(
        &self,
        application: Option<&Application>,
        request: &AuthorizationRequest,
    ) -> Result<ValidatedAuthorization, ClientError> {
        let application = match application {
            Some(app) if !app.is_system() && app.client_id == request.client_id => app,
            _ => return Err(ClientError::UnknownClient),
        };

        if !application.allows_redirect_uri(&request.redirect_uri) {
            return Err(ClientError::BadRedirectUri);
        }

        let scopes = self.validate_scopes(application, &request.scope)?;

        if request.response_type != "code" {
            return Err(ClientError::UnsupportedResponseType(
                request.response_type.clone(),
            ));
        }

        let response_mode = match request.response_mode.as_deref() {
            None | Some("") => ResponseMode::default(),
            Some(mode) => mode.parse()?,
        };

        let challenge = self.validate_challenge(
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        )?;

        Ok(ValidatedAuthorization {
            application: application.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            response_mode,
            challenge,
            state: request.state.clone(),
        })
    }

    fn validate_scopes(
        &self,
        application: &Application,
        raw: &str,
    ) -> Result<ScopeSet, ClientError> {
        let requested = ScopeSet::parse(raw).map_err(|unknown| ClientError::ScopeExceeded {
            scopes: unknown,
        })?;
        let excess = requested.difference(&application.scopes);
        if !excess.is_empty() {
            return Err(ClientError::ScopeExceeded {
                scopes: excess.iter().map(|s| s.as_str().to_string()).collect(),
            });
        }
        Ok(requested)
    }

    fn validate_challenge(
        &self,
        challenge: Option<&str>,
        method: Option<&str>,
    ) -> Result<Option<PkceChallenge>, ClientError> {
        match (challenge, method) {
            (None, None) => Ok(None),
            (Some(challenge), Some(method)) => {
                let method: PkceMethod = method
                    .parse()
                    .map_err(ClientError::BadCodeChallengeParams)?;
                if challenge.is_empty() || challenge.len() > self.code_challenge_max_length {
                    return Err(ClientError::BadCodeChallengeParams(format!(
                        "code_challenge length must be 1..={}",
                        self.code_challenge_max_length
                    )));
                }
                Ok(Some(PkceChallenge::new(method, challenge)))
            }
            _ => Err(ClientError::BadCodeChallengeParams(
                "code_challenge and code_challenge_method must be supplied together".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Scope, UserId};

    fn app() -> Application {
        Application::new(
            Some(UserId(1)),
            "Client",
            "client-1",
            ScopeSet::from([Scope::ReadPrefs, Scope::WriteApi]),
            vec![
                "https://client.example/cb".to_string(),
                "urn:ietf:wg:oauth:2.0:oob".to_string(),
            ],
        )
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: "client-1".into(),
            redirect_uri: "https://client.example/cb".into(),
            scope: "read_prefs".into(),
            response_type: "code".into(),
            ..Default::default()
        }
    }

    fn validator() -> AuthorizationRequestValidator {
        AuthorizationRequestValidator::new(&OAuthConfig::default())
    }

    #[test]
    fn test_valid_request() {
        let app = app();
        let validated = validator().validate(Some(&app), &request()).unwrap();
        assert_eq!(validated.scopes, ScopeSet::from([Scope::ReadPrefs]));
        assert_eq!(validated.response_mode, ResponseMode::Query);
        assert!(validated.challenge.is_none());
    }

    #[test]
    fn test_unknown_and_system_clients() {
        assert_eq!(
            validator().validate(None, &request()).unwrap_err(),
            ClientError::UnknownClient
        );

        let mut system = app();
        system.owner = None;
        assert_eq!(
            validator().validate(Some(&system), &request()).unwrap_err(),
            ClientError::UnknownClient
        );
    }

    #[test]
    fn test_redirect_uri_must_be_registered_exactly() {
        let app = app();
        let mut req = request();
        req.redirect_uri = "https://client.example/cb/../evil".into();
        assert_eq!(
            validator().validate(Some(&app), &req).unwrap_err(),
            ClientError::BadRedirectUri
        );
    }

    #[test]
    fn test_scopes_exceeding_allowance_are_named() {
        let app = app();
        let mut req = request();
        req.scope = "read_prefs write_gpx write_notes".into();
        assert_eq!(
            validator().validate(Some(&app), &req).unwrap_err(),
            ClientError::ScopeExceeded {
                scopes: vec!["write_gpx".into(), "write_notes".into()]
            }
        );

        req.scope = "read_prefs bogus".into();
        assert_eq!(
            validator().validate(Some(&app), &req).unwrap_err(),
            ClientError::ScopeExceeded {
                scopes: vec!["bogus".into()]
            }
        );
    }

    #[test]
    fn test_response_type_and_mode() {
        let app = app();
        let mut req = request();
        req.response_type = "token".into();
        assert_eq!(
            validator().validate(Some(&app), &req).unwrap_err(),
            ClientError::UnsupportedResponseType("token".into())
        );

        let mut req = request();
        req.response_mode = Some("fragment".into());
        assert_eq!(
            validator()
                .validate(Some(&app), &req)
                .unwrap()
                .response_mode,
            ResponseMode::Fragment
        );
    }

    #[test]
    fn test_challenge_params_must_be_paired() {
        let app = app();
        let mut req = request();
        req.code_challenge = Some("x".repeat(43));
        assert!(matches!(
            validator().validate(Some(&app), &req),
            Err(ClientError::BadCodeChallengeParams(_))
        ));

        req.code_challenge_method = Some("S256".into());
        let validated = validator().validate(Some(&app), &req).unwrap();
        assert_eq!(validated.challenge.unwrap().method, PkceMethod::S256);

        req.code_challenge_method = Some("S512".into());
        assert!(matches!(
            validator().validate(Some(&app), &req),
            Err(ClientError::BadCodeChallengeParams(_))
        ));
    }

    #[test]
    fn test_challenge_length_is_bounded() {
        let app = app();
        let mut req = request();
        req.code_challenge = Some("x".repeat(256));
        req.code_challenge_method = Some("plain".into());
        assert!(matches!(
            validator().validate(Some(&app), &req),
            Err(ClientError::BadCodeChallengeParams(_))
        ));
    }
}
