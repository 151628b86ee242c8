//! Secret generation and hashing.
//!
//! Authorization codes and access tokens are 256-bit random values encoded
//! as unpadded base64url. Only their one-way hash is ever persisted; the
//! hash doubles as the lookup key, so the token hasher must be
//! deterministic.
//!
//! Client secrets are looked up by client id instead and are hashed with
//! salted Argon2id.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::AuthResult;

// =============================================================================
// Token Hashing
// =============================================================================

/// One-way hash used as the storage key for codes and tokens.
pub trait SecretHasher: Send + Sync {
    /// Deterministically hashes `secret`.
    fn hash(&self, secret: &str) -> String;

    /// Constant-time check of `secret` against a stored hash.
    fn verify(&self, secret: &str, hash: &str) -> bool {
        self.hash(secret).as_bytes().ct_eq(hash.as_bytes()).into()
    }
}

/// SHA-256, base64url encoded without padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl SecretHasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(secret.as_bytes()))
    }
}

// =============================================================================
// Secret Generation
// =============================================================================

/// Source of opaque random secrets.
pub trait SecretGenerator: Send + Sync {
    /// Returns a fresh secret with at least 256 bits of entropy.
    fn generate(&self) -> String;
}

/// 32 bytes from the thread-local CSPRNG, base64url encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSecretGenerator;

impl SecretGenerator for RandomSecretGenerator {
    fn generate(&self) -> String {
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

// =============================================================================
// Client Secrets
// =============================================================================

/// Hash a client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Internal` if hashing fails.
pub fn hash_client_secret(secret: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("failed to hash client secret: {e}")))
}

/// Verify a client secret against its stored Argon2 hash.
///
/// A malformed stored hash verifies as `false`.
#[must_use]
pub fn verify_client_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("stored client secret hash is not in PHC format");
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
