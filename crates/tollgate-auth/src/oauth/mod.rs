//! OAuth 2.0 authorization-code flow.
//!
//! - [`authorize`] - request and response types for the authorize endpoint
//! - [`validator`] - request validation against the application registry
//! - [`silent_auth`] - skipping consent for equivalent prior grants
//! - [`issuer`] - minting and delivering authorization codes
//! - [`exchange`] - redeeming codes for access tokens
//! - [`pkce`] - PKCE challenge verification
//! - [`service`] - the authorize flow end to end

pub mod authorize;
pub mod exchange;
pub mod issuer;
pub mod pkce;
pub mod service;
pub mod silent_auth;
pub mod validator;

pub use authorize::{
    AuthorizationRequest, AuthorizeOutcome, CodeDelivery, ConsentPrompt, ResponseMode,
    ValidatedAuthorization,
};
pub use exchange::{
    ClientCredentials, CodeExchanger, ExchangeRequest, GRANT_TYPE_AUTHORIZATION_CODE,
    TokenRequest, TokenResponse,
};
pub use issuer::AuthorizationCodeIssuer;
pub use pkce::{PkceChallenge, PkceMethod};
pub use service::{AuthorizationService, AuthorizeMode};
pub use silent_auth::{SilentAuthChecker, SilentAuthDecision};
pub use validator::AuthorizationRequestValidator;
