//! SMS one-time-passcode verification record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerification {
    /// Opaque handle identifying the challenge. The code is the secret.
    pub token: String,
    pub phone_number: String,
    pub otp_code: String,
    pub expires_at: DateTime<Utc>,
    pub trials: u32,
    /// Set once the correct code has been submitted.
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OtpVerification {
    pub fn is_verified(&self) -> bool {
        self.valid_until.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CreateOtpVerification {
    pub token: String,
    pub phone_number: String,
    pub otp_code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one verification attempt, written as a single row update.
#[derive(Debug, Clone)]
pub struct OtpAttempt {
    /// Trial count read before the attempt; the write only applies while
    /// the stored count still equals it.
    pub observed_trials: u32,
    /// `Some` when the submitted code matched.
    pub valid_until: Option<DateTime<Utc>>,
}
