//! SurrealDB repository implementations.

mod audience_secret;
mod otp_verification;
mod revoked_token;
mod user;

pub use audience_secret::SurrealAudienceSecretRepository;
pub use otp_verification::SurrealOtpVerificationRepository;
pub use revoked_token::SurrealRevokedTokenRepository;
pub use user::SurrealUserRepository;
