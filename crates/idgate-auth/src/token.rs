//! HS256 token encoding, claim shape checks and per-audience secret
//! derivation.
//!
//! Verification is split in two: [`peek`] reads the claims without
//! checking the signature so the audience (and with it the signing
//! secret) can be resolved, then [`verify`] checks the signature against
//! that secret. Expiry is left to the caller, which owns the clock.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use idgate_core::models::audience_secret::audience_for;

use crate::error::AuthError;

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    /// Present on refresh tokens only; the unit of revocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub user_id: String,
}

/// An access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign `claims` with `secret`.
pub fn sign(claims: &TokenClaims, secret: &[u8]) -> Result<String, AuthError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode the claims of `token` without checking its signature.
///
/// The result must not be trusted beyond locating the signing secret.
pub fn peek(token: &str) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidClaims(format!("malformed token: {e}")))
}

/// Check issuer, audience and subject, returning the user id.
pub fn check_shape(claims: &TokenClaims, issuer: &str) -> Result<Uuid, AuthError> {
    if claims.iss != issuer {
        return Err(AuthError::InvalidClaims("unexpected issuer".into()));
    }

    let [audience] = claims.aud.as_slice() else {
        return Err(AuthError::InvalidClaims(
            "audience must have exactly one entry".into(),
        ));
    };

    let user_id = Uuid::parse_str(&claims.user_id)
        .map_err(|_| AuthError::InvalidClaims("user_id is not a valid identifier".into()))?;

    if *audience != audience_for(user_id) {
        return Err(AuthError::InvalidClaims(
            "audience does not belong to user".into(),
        ));
    }

    Ok(user_id)
}

/// Verify the HS256 signature of `token` against `secret` and return its
/// claims.
pub fn verify(token: &str, secret: &[u8]) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidClaims(format!("signature rejected: {e}")))
}

/// Derive a fresh signing secret for a user: SHA-256 over the password
/// hash, the current time in nanoseconds (little-endian u64) and a random
/// nonce.
///
/// The nonce keeps a secret deleted by RevokeAll from being derived again
/// when a new one is created at the same instant.
pub fn derive_secret(password_hash: &str, now: DateTime<Utc>, nonce: &[u8]) -> Vec<u8> {
    let nanos = now.timestamp_nanos_opt().unwrap_or_default() as u64;
    let mut hasher = Sha256::new();
    hasher.update(password_hash.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(nonce);
    hasher.finalize().to_vec()
}

/// Random input for [`derive_secret`].
pub fn secret_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}
