//! Password hashing using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier};
use rand::RngCore;

use crate::error::AuthError;

/// Hashes and verifies passwords.
pub trait PasswordHasher: Send + Sync {
    /// Hash `password` into a self-describing string.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
    /// `Err(AuthError::Crypto)` if the stored hash is malformed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id with default parameters, producing PHC strings.
///
/// If a pepper is configured it is prepended to the password before
/// hashing and verification; changing it invalidates every stored hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    pepper: Option<String>,
}

impl Argon2Hasher {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }

    fn peppered(&self, password: &str) -> Vec<u8> {
        match &self.pepper {
            Some(p) => format!("{p}{password}").into_bytes(),
            None => password.as_bytes().to_vec(),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut salt = [0u8; 16];
        rand::rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| AuthError::Crypto(format!("salt encoding: {e}")))?;

        Argon2::default()
            .hash_password(&self.peppered(password), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        match Argon2::default().verify_password(&self.peppered(password), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }
}
