//! Token, OTP and credential error types.

use idgate_core::error::IdgateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    // -- token validation --
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("failed to revoke token: {0}")]
    RevocationFailed(String),

    #[error("{0}")]
    InvalidInput(String),

    // -- OTP --
    #[error("verification not found")]
    OtpNotFound,

    #[error("already verified")]
    AlreadyVerified,

    #[error("verification expired")]
    OtpExpired,

    #[error("verification trials exceeded")]
    TrialsExceeded,

    #[error("verification code mismatch")]
    CodeMismatch,

    #[error("verification not found")]
    VerificationNotFound,

    #[error("invalid or expired verification")]
    InvalidOrExpiredVerification,

    #[error("invalid phone number")]
    InvalidPhoneNumber,

    // -- collaborators --
    #[error("SMS delivery failed: {0}")]
    SmsDelivery(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Storage(#[from] IdgateError),
}

impl From<AuthError> for IdgateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired | AuthError::InvalidClaims(_) | AuthError::TokenRevoked => {
                IdgateError::Unauthenticated {
                    reason: err.to_string(),
                }
            }
            AuthError::RevocationFailed(msg) => IdgateError::RevocationFailure(msg),
            AuthError::OtpNotFound | AuthError::VerificationNotFound => IdgateError::NotFound {
                entity: "verification".into(),
                id: String::new(),
            },
            AuthError::AlreadyVerified => IdgateError::AlreadyInState {
                reason: err.to_string(),
            },
            AuthError::OtpExpired => IdgateError::Expired {
                reason: err.to_string(),
            },
            AuthError::TrialsExceeded => IdgateError::TrialsExceeded,
            AuthError::InvalidInput(message) => IdgateError::InvalidInput { message },
            AuthError::CodeMismatch
            | AuthError::InvalidOrExpiredVerification
            | AuthError::InvalidPhoneNumber => IdgateError::InvalidInput {
                message: err.to_string(),
            },
            AuthError::SmsDelivery(msg) => IdgateError::Internal(msg),
            AuthError::Crypto(msg) => IdgateError::Crypto(msg),
            AuthError::Storage(inner) => inner,
        }
    }
}
