//! PKCE (Proof Key for Code Exchange, RFC 7636).
//!
//! Both `plain` and `S256` are accepted. The outcome of a token request is
//! decided by [`verify`]:
//!
//! | stored method | verifier             | outcome                        |
//! |---------------|----------------------|--------------------------------|
//! | none          | absent               | accept                         |
//! | none          | present              | [`GrantError::MethodNotSet`]   |
//! | plain         | equals challenge     | accept                         |
//! | S256          | S256(verifier) match | accept                         |
//! | plain / S256  | mismatch or absent   | [`GrantError::BadVerifier`]    |

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::GrantError;

// =============================================================================
// Challenge Method
// =============================================================================

/// PKCE code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "S256")]
    S256,
}

impl PkceMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(format!("unsupported code_challenge_method: {other}")),
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Challenge
// =============================================================================

/// Challenge registered with an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    pub method: PkceMethod,
    pub challenge: String,
}

impl PkceChallenge {
    #[must_use]
    pub fn new(method: PkceMethod, challenge: impl Into<String>) -> Self {
        Self {
            method,
            challenge: challenge.into(),
        }
    }

    /// Computes the S256 challenge for a verifier.
    #[must_use]
    pub fn s256(verifier: &str) -> Self {
        Self::new(PkceMethod::S256, s256_transform(verifier))
    }

    /// Whether `verifier` satisfies this challenge. Constant time.
    #[must_use]
    pub fn matches(&self, verifier: &str) -> bool {
        let expected = match self.method {
            PkceMethod::Plain => verifier.to_string(),
            PkceMethod::S256 => s256_transform(verifier),
        };
        expected
            .as_bytes()
            .ct_eq(self.challenge.as_bytes())
            .into()
    }
}

/// `BASE64URL-ENCODE(SHA256(ASCII(verifier)))`
#[must_use]
pub fn s256_transform(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Checks a token request's verifier against the stored challenge.
///
/// # Errors
///
/// See the module-level table.
pub fn verify(stored: Option<&PkceChallenge>, verifier: Option<&str>) -> Result<(), GrantError> {
    match (stored, verifier) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(GrantError::MethodNotSet),
        (Some(challenge), Some(verifier)) if challenge.matches(verifier) => Ok(()),
        (Some(challenge), _) => Err(GrantError::BadVerifier {
            method: challenge.method,
        }),
    }
}
