//! SMS one-time passcode challenges.
//!
//! A challenge is created by [`OtpEngine::request`], proven by
//! [`OtpEngine::verify`] and then read by [`OtpEngine::consume`] while its
//! validity window lasts:
//!
//! ```text
//! Pending ──verify(ok)──▶ Verified ──(valid_until passes)──▶ unusable
//!    │
//!    ├──(expires_at passes)──▶ Expired
//!    └──(max trials used)────▶ TrialsExceeded
//! ```
//!
//! Every verification attempt, the successful one included, uses up one
//! trial. Attempts are applied with a compare-and-set on the stored trial
//! count so concurrent attempts on one challenge cannot overspend it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use idgate_core::clock::Clock;
use idgate_core::error::IdgateError;
use idgate_core::models::otp_verification::{CreateOtpVerification, OtpAttempt, OtpVerification};
use idgate_core::repository::OtpVerificationRepository;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::phone;
use crate::sms::SmsSender;

/// Compare-and-set retries before an attempt is reported as failed.
const MAX_ATTEMPT_RETRIES: usize = 3;

/// Result of [`OtpEngine::request`]. The code itself only travels by SMS.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub verification_token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: Duration,
}

pub struct OtpEngine<O, M> {
    store: O,
    sms: M,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl<O, M> OtpEngine<O, M>
where
    O: OtpVerificationRepository,
    M: SmsSender,
{
    pub fn new(store: O, sms: M, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        Self {
            store,
            sms,
            clock,
            config,
        }
    }

    /// Start a challenge for `phone_number` (E.164) and text it the code.
    pub async fn request(&self, phone_number: &str) -> Result<OtpChallenge, AuthError> {
        let phone_number = phone::require_e164(phone_number)?;

        let now = self.clock.now();
        let expires_in = Duration::seconds(self.config.otp_expiry_secs as i64);
        let token = Uuid::new_v4().to_string();
        let code = generate_code(self.config.otp_code_length);

        let record = self
            .store
            .create(CreateOtpVerification {
                token,
                phone_number,
                otp_code: code.clone(),
                expires_at: now + expires_in,
                created_at: now,
            })
            .await?;

        // A failed send leaves the record to expire on its own.
        self.sms
            .send(&record.phone_number, &format!("{code} is your authentication code."))
            .await?;

        info!(token = %record.token, "OTP challenge issued");
        Ok(OtpChallenge {
            verification_token: record.token,
            expires_at: record.expires_at,
            expires_in,
        })
    }

    /// Check `code` against the challenge `token`, using up one trial.
    pub async fn verify(&self, token: &str, code: &str) -> Result<(), AuthError> {
        if token.is_empty() || code.is_empty() {
            return Err(AuthError::InvalidInput(
                "verification token and code are required".into(),
            ));
        }

        let mut record = self.load(token, AuthError::OtpNotFound).await?;

        for _ in 0..MAX_ATTEMPT_RETRIES {
            let now = self.clock.now();
            if record.is_verified() {
                return Err(AuthError::AlreadyVerified);
            }
            if now > record.expires_at {
                return Err(AuthError::OtpExpired);
            }
            if record.trials >= self.config.otp_max_trials {
                return Err(AuthError::TrialsExceeded);
            }

            let matched = record.otp_code == code;
            let attempt = OtpAttempt {
                observed_trials: record.trials,
                valid_until: matched
                    .then(|| now + Duration::seconds(self.config.otp_validity_secs as i64)),
            };

            match self.store.record_attempt(token, attempt).await? {
                Some(updated) if matched => {
                    info!(token, trials = updated.trials, "OTP verified");
                    return Ok(());
                }
                Some(updated) => {
                    debug!(token, trials = updated.trials, "OTP code mismatch");
                    return Err(AuthError::CodeMismatch);
                }
                None => {
                    debug!(token, "concurrent OTP attempt, re-reading");
                    record = self.load(token, AuthError::OtpNotFound).await?;
                }
            }
        }

        warn!(token, "OTP attempt kept losing to concurrent attempts");
        Err(IdgateError::Internal("verification is busy, try again".into()).into())
    }

    /// Return the phone number a verified, still valid challenge proved.
    pub async fn consume(&self, token: &str) -> Result<String, AuthError> {
        let record = self.load(token, AuthError::VerificationNotFound).await?;
        match record.valid_until {
            Some(valid_until) if valid_until >= self.clock.now() => Ok(record.phone_number),
            _ => Err(AuthError::InvalidOrExpiredVerification),
        }
    }

    async fn load(&self, token: &str, missing: AuthError) -> Result<OtpVerification, AuthError> {
        match self.store.get_by_token(token).await {
            Ok(record) => Ok(record),
            Err(IdgateError::NotFound { .. }) => Err(missing),
            Err(e) => Err(e.into()),
        }
    }
}

/// Uniformly random decimal code of `length` digits.
fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
