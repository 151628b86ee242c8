//! Authorization service configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root authorization configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.oauth]
/// authorization_code_timeout = "3m"
/// silent_auth_query_limit = 10
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Public base URL of the authorization server. Used in the
    /// discovery document.
    pub issuer: String,

    /// Authorization-code and token settings.
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
        }
    }
}

/// Authorization-code and token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// How long a pending authorization code stays redeemable.
    #[serde(with = "humantime_serde")]
    pub authorization_code_timeout: Duration,

    /// How many of a user's most recent grants are inspected when looking
    /// for an equivalent prior consent.
    pub silent_auth_query_limit: usize,

    /// Longest accepted `code_challenge`.
    pub code_challenge_max_length: usize,

    /// Number of leading characters of a personal access token kept in
    /// clear text so users can tell their tokens apart.
    pub secret_preview_length: usize,

    /// Maximum personal access tokens per user.
    pub pat_limit: usize,

    /// Longest accepted personal access token name.
    pub pat_name_max_length: usize,

    /// Interval between expired-code sweeps.
    #[serde(with = "humantime_serde")]
    pub reaper_interval: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_timeout: Duration::from_secs(180),
            silent_auth_query_limit: 10,
            code_challenge_max_length: 255,
            secret_preview_length: 7,
            pat_limit: 100,
            pat_name_max_length: 50,
            reaper_interval: Duration::from_secs(60),
        }
    }
}

impl OAuthConfig {
    /// Sets the authorization code timeout.
    #[must_use]
    pub fn with_code_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_code_timeout = timeout;
        self
    }

    /// Sets the silent authentication search bound.
    #[must_use]
    pub fn with_silent_auth_query_limit(mut self, limit: usize) -> Self {
        self.silent_auth_query_limit = limit;
        self
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the issuer is empty, and
    /// `ConfigError::InvalidValue` if any limit is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("auth.issuer".to_string()));
        }
        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "auth.issuer is not an absolute URL: '{}'",
                self.issuer
            )));
        }

        let oauth = &self.oauth;
        if oauth.authorization_code_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "authorization_code_timeout must be greater than zero".to_string(),
            ));
        }
        if oauth.reaper_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "reaper_interval must be greater than zero".to_string(),
            ));
        }
        if oauth.silent_auth_query_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "silent_auth_query_limit must be at least 1".to_string(),
            ));
        }
        // An S256 challenge is 43 characters.
        if oauth.code_challenge_max_length < 43 {
            return Err(ConfigError::InvalidValue(format!(
                "code_challenge_max_length must be >= 43, got {}",
                oauth.code_challenge_max_length
            )));
        }
        if oauth.secret_preview_length == 0 || oauth.secret_preview_length > 16 {
            return Err(ConfigError::InvalidValue(format!(
                "secret_preview_length must be between 1 and 16, got {}",
                oauth.secret_preview_length
            )));
        }
        if oauth.pat_name_max_length == 0 {
            return Err(ConfigError::InvalidValue(
                "pat_name_max_length must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.oauth.authorization_code_timeout,
            Duration::from_secs(180)
        );
        assert_eq!(config.oauth.silent_auth_query_limit, 10);
        assert_eq!(config.oauth.secret_preview_length, 7);
    }

    #[test]
    fn test_humantime_durations_parse() {
        let json = r#"{"issuer":"https://auth.example.com","oauth":{"authorization_code_timeout":"5m","reaper_interval":"30s"}}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.oauth.authorization_code_timeout,
            Duration::from_secs(300)
        );
        assert_eq!(config.oauth.reaper_interval, Duration::from_secs(30));
        assert_eq!(config.oauth.code_challenge_max_length, 255);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AuthConfig::default();
        config.issuer = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let mut config = AuthConfig::default();
        config.oauth.silent_auth_query_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AuthConfig::default();
        config.oauth.authorization_code_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AuthConfig::default();
        config.oauth.code_challenge_max_length = 10;
        assert!(config.validate().is_err());
    }
}
