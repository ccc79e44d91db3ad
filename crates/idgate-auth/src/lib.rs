//! idgate Auth: session tokens, SMS one-time passcodes, password
//! hashing and the identity flows built on them.

pub mod config;
pub mod error;
pub mod identity;
pub mod otp;
pub mod password;
pub mod phone;
pub mod service;
pub mod sms;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use identity::{IdentityService, PersonalInfo, RegisterInput, RegisterOutput};
pub use otp::{OtpChallenge, OtpEngine};
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::TokenService;
pub use sms::{HttpSmsSender, LogSmsSender, SmsSender};
pub use token::{TokenClaims, TokenPair};
