//! Domain models for idgate.
//!
//! These are the core types shared across all crates.

pub mod audience_secret;
pub mod otp_verification;
pub mod revoked_token;
pub mod user;
