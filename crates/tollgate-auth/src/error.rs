//! Authorization error types.
//!
//! Errors are split by who caused them:
//!
//! - [`ClientError`] - the requesting application sent something we refuse
//!   (unknown client, unregistered redirect, scopes it may not ask for).
//! - [`GrantError`] - the authorization code itself cannot be redeemed.
//! - [`AuthError::Unauthorized`] - no authenticated end user is acting.
//!
//! All three are fail-fast and never retried. Only [`AuthError::Storage`]
//! is transient.

use std::fmt;

use crate::oauth::pkce::PkceMethod;

/// Errors caused by the requesting client application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// No application is registered under the client id, or it is a
    /// system application that third parties may not drive.
    #[error("unknown client")]
    UnknownClient,

    /// The redirect URI is not an exact member of the registered set.
    #[error("redirect URI is not registered for this client")]
    BadRedirectUri,

    /// The request asked for scopes outside the application's allowance.
    #[error("requested scopes exceed the client's allowance: {}", .scopes.join(" "))]
    ScopeExceeded {
        /// Offending scope names, in request order.
        scopes: Vec<String>,
    },

    /// `response_type` other than `code`.
    #[error("unsupported response_type: {0}")]
    UnsupportedResponseType(String),

    /// `response_mode` other than `query`, `fragment` or `form_post`.
    #[error("unsupported response_mode: {0}")]
    UnsupportedResponseMode(String),

    /// `grant_type` other than `authorization_code`.
    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    /// PKCE parameters are unpaired, too long, or name an unknown method.
    #[error("invalid code challenge parameters: {0}")]
    BadCodeChallengeParams(String),

    /// A confidential client did not authenticate with its secret.
    #[error("client authentication failed")]
    BadClientSecret,
}

impl ClientError {
    /// Stable machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownClient => "unknown_client",
            Self::BadRedirectUri => "bad_redirect_uri",
            Self::ScopeExceeded { .. } => "scope_exceeded",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedResponseMode(_) => "unsupported_response_mode",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::BadCodeChallengeParams(_) => "bad_code_challenge_params",
            Self::BadClientSecret => "bad_client_secret",
        }
    }
}

/// Errors raised while redeeming an authorization code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    /// No pending code matches, or it was already exchanged or expired.
    #[error("authorization code not found or already used")]
    NotFoundOrUsed,

    /// A verifier was supplied but the code was issued without a challenge.
    #[error("code_verifier supplied but no code challenge was registered")]
    MethodNotSet,

    /// The verifier is missing or does not match the stored challenge.
    #[error("code_verifier does not satisfy the {method} challenge")]
    BadVerifier {
        /// Method the challenge was registered with.
        method: PkceMethod,
    },

    /// The token request named a different redirect URI than the
    /// authorization request did.
    #[error("redirect_uri does not match the authorization request")]
    RedirectUriMismatch,
}

impl GrantError {
    /// Stable machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFoundOrUsed => "not_found_or_used",
            Self::MethodNotSet => "method_not_set",
            Self::BadVerifier { .. } => "bad_verifier",
            Self::RedirectUriMismatch => "redirect_uri_mismatch",
        }
    }
}

/// Top-level error for every authorization operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client application's request is unacceptable.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The authorization code cannot be redeemed.
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// No authenticated user is acting on the request.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the caller is not authenticated.
        message: String,
    },

    /// Malformed input that is not attributable to a client application,
    /// e.g. a personal access token name that is too long.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The backing store failed. The operation was rolled back and may be
    /// retried.
    #[error("Storage error: {message}")]
    Storage {
        /// Driver-level description.
        message: String,
    },

    /// Invalid configuration detected at runtime.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create an `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if the requesting client application is at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Client(_) | Self::InvalidRequest { .. })
    }

    /// Returns `true` if the authorization code could not be redeemed.
    #[must_use]
    pub fn is_grant_error(&self) -> bool {
        matches!(self, Self::Grant(_))
    }

    /// Returns `true` for server-side failures.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if the failure is transient and the whole operation
    /// may be retried. Client and grant errors never are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Machine-readable kind, finer grained than the OAuth error code.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Client(e) => e.kind(),
            Self::Grant(e) => e.kind(),
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Storage { .. } => "storage",
            Self::Configuration { .. } => "configuration",
            Self::Internal { .. } => "internal",
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Client(_) | Self::InvalidRequest { .. } => ErrorCategory::Client,
            Self::Grant(_) => ErrorCategory::Grant,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::Storage { .. } => ErrorCategory::Storage,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// OAuth 2.0 error code (RFC 6749 section 4.1.2.1 and 5.2).
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::Client(e) => match e {
                ClientError::UnknownClient | ClientError::BadClientSecret => "invalid_client",
                ClientError::ScopeExceeded { .. } => "invalid_scope",
                ClientError::UnsupportedResponseType(_) => "unsupported_response_type",
                ClientError::UnsupportedGrantType(_) => "unsupported_grant_type",
                ClientError::BadRedirectUri
                | ClientError::UnsupportedResponseMode(_)
                | ClientError::BadCodeChallengeParams(_) => "invalid_request",
            },
            Self::Grant(_) => "invalid_grant",
            Self::Unauthorized { .. } => "login_required",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Storage { .. } => "temporarily_unavailable",
            Self::Configuration { .. } | Self::Internal { .. } => "server_error",
        }
    }
}

/// Coarse error grouping for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client application errors.
    Client,
    /// Authorization code redemption errors.
    Grant,
    /// Missing end-user authentication.
    Authentication,
    /// Transient storage errors.
    Storage,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Grant => write!(f, "grant"),
            Self::Authentication => write!(f, "authentication"),
            Self::Storage => write!(f, "storage"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::from(ClientError::ScopeExceeded {
            scopes: vec!["write_api".into(), "write_gpx".into()],
        });
        assert_eq!(
            err.to_string(),
            "requested scopes exceed the client's allowance: write_api write_gpx"
        );

        let err = AuthError::from(GrantError::BadVerifier {
            method: PkceMethod::S256,
        });
        assert_eq!(
            err.to_string(),
            "code_verifier does not satisfy the S256 challenge"
        );
    }

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(AuthError::storage("connection reset").is_retryable());
        assert!(!AuthError::from(GrantError::NotFoundOrUsed).is_retryable());
        assert!(!AuthError::from(ClientError::UnknownClient).is_retryable());
        assert!(!AuthError::unauthorized("no session").is_retryable());
    }

    #[test]
    fn test_oauth_error_codes() {
        assert_eq!(
            AuthError::from(ClientError::UnknownClient).oauth_error_code(),
            "invalid_client"
        );
        assert_eq!(
            AuthError::from(ClientError::BadRedirectUri).oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(
            AuthError::from(GrantError::MethodNotSet).oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            AuthError::storage("down").oauth_error_code(),
            "temporarily_unavailable"
        );
    }

    #[test]
    fn test_kinds_and_categories() {
        let err = AuthError::from(GrantError::NotFoundOrUsed);
        assert_eq!(err.kind(), "not_found_or_used");
        assert_eq!(err.category(), ErrorCategory::Grant);
        assert!(err.is_grant_error());

        let err = AuthError::from(ClientError::ScopeExceeded { scopes: vec![] });
        assert_eq!(err.kind(), "scope_exceeded");
        assert!(err.is_client_error());
        assert_eq!(err.category().to_string(), "client");
    }
}
