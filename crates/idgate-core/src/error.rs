//! Error types for the idgate system.

use thiserror::Error;

/// Outward classification of a failure.
///
/// Every [`IdgateError`] maps onto exactly one kind; transports translate
/// kinds into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request; the caller's fault and never worth retrying.
    InvalidInput,
    NotFound,
    AlreadyInState,
    Expired,
    TrialsExceeded,
    /// The presented credential is unusable; re-authenticate.
    Unauthenticated,
    /// Recording a revocation failed, so the token may still be usable.
    RevocationFailure,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum IdgateError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("{reason}")]
    AlreadyInState { reason: String },

    #[error("{reason}")]
    Expired { reason: String },

    #[error("Maximum verification trials exceeded")]
    TrialsExceeded,

    #[error("Authentication failed: {reason}")]
    Unauthenticated { reason: String },

    #[error("Token revocation failed: {0}")]
    RevocationFailure(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdgateError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } | Self::AlreadyInState { .. } => ErrorKind::AlreadyInState,
            Self::Expired { .. } => ErrorKind::Expired,
            Self::TrialsExceeded => ErrorKind::TrialsExceeded,
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::RevocationFailure(_) => ErrorKind::RevocationFailure,
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a client.
    ///
    /// Storage and crypto details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".into(),
            ErrorKind::RevocationFailure => "failed to revoke token".into(),
            ErrorKind::NotFound => match self {
                Self::NotFound { entity, .. } => format!("{entity} not found"),
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

pub type IdgateResult<T> = Result<T, IdgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_classify_as_internal() {
        assert_eq!(
            IdgateError::Database("connection reset".into()).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            IdgateError::Crypto("bad key".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn public_message_hides_internal_detail() {
        let err = IdgateError::Database("table user: index idx_user_email".into());
        assert_eq!(err.public_message(), "internal error");

        let err = IdgateError::RevocationFailure("write timeout".into());
        assert_eq!(err.public_message(), "failed to revoke token");
    }

    #[test]
    fn not_found_public_message_omits_identifier() {
        let err = IdgateError::NotFound {
            entity: "user".into(),
            id: "phone_number=+821012345678".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.public_message(), "user not found");
    }

    #[test]
    fn conflicts_are_already_in_state() {
        let err = IdgateError::AlreadyExists {
            entity: "revoked_token".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyInState);
    }
}
