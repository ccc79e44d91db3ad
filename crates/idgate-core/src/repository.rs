//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Repositories whose writes must
//! commit together with writes of other repositories share a
//! [`Transactional::Tx`] type and accept it explicitly.

use uuid::Uuid;

use crate::error::IdgateResult;
use crate::models::{
    audience_secret::{AudienceSecret, CreateAudienceSecret},
    otp_verification::{CreateOtpVerification, OtpAttempt, OtpVerification},
    revoked_token::RevokedToken,
    user::{CreateUser, User},
};

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A set of writes that either all apply or none do.
///
/// Dropping a unit of work without committing discards it.
pub trait UnitOfWork: Send {
    fn commit(self) -> impl Future<Output = IdgateResult<()>> + Send;
}

pub trait Transactional: Send + Sync {
    type Tx: UnitOfWork;

    fn begin(&self) -> Self::Tx;
}

// ---------------------------------------------------------------------------
// Identity storage
// ---------------------------------------------------------------------------

pub trait UserRepository: Transactional {
    /// Fails with `AlreadyExists` when the email, phone number or
    /// confirmation code is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = IdgateResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = IdgateResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = IdgateResult<User>> + Send;
    fn get_by_phone_number(
        &self,
        phone_number: &str,
    ) -> impl Future<Output = IdgateResult<User>> + Send;
    fn get_by_confirmation_code(
        &self,
        code: &str,
    ) -> impl Future<Output = IdgateResult<User>> + Send;
    fn confirm_email(&self, id: Uuid) -> impl Future<Output = IdgateResult<User>> + Send;
    /// Enlist a password hash change in `tx`.
    fn set_password_hash(&self, tx: &mut Self::Tx, id: Uuid, password_hash: &str);
}

// ---------------------------------------------------------------------------
// Token storage
// ---------------------------------------------------------------------------

pub trait AudienceSecretRepository: Transactional {
    fn get_by_audience(
        &self,
        audience: &str,
    ) -> impl Future<Output = IdgateResult<AudienceSecret>> + Send;
    /// Insert the secret unless the audience already has one, and return
    /// whichever secret is stored afterwards.
    fn insert_or_get(
        &self,
        input: CreateAudienceSecret,
    ) -> impl Future<Output = IdgateResult<AudienceSecret>> + Send;
    /// Delete every secret of `audience`, immediately or as part of `tx`.
    fn delete_by_audience(
        &self,
        audience: &str,
        tx: Option<&mut Self::Tx>,
    ) -> impl Future<Output = IdgateResult<()>> + Send;
}

pub trait RevokedTokenRepository: Send + Sync {
    fn exists(&self, jti: &str) -> impl Future<Output = IdgateResult<bool>> + Send;
    /// Fails with `AlreadyExists` when the `jti` is already revoked.
    fn insert(&self, entry: RevokedToken) -> impl Future<Output = IdgateResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// OTP storage
// ---------------------------------------------------------------------------

pub trait OtpVerificationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOtpVerification,
    ) -> impl Future<Output = IdgateResult<OtpVerification>> + Send;
    fn get_by_token(&self, token: &str)
    -> impl Future<Output = IdgateResult<OtpVerification>> + Send;
    /// Increment the trial count (and set `valid_until` on success) only
    /// while the stored count equals `attempt.observed_trials`.
    ///
    /// Returns `None` when another attempt got there first.
    fn record_attempt(
        &self,
        token: &str,
        attempt: OtpAttempt,
    ) -> impl Future<Output = IdgateResult<Option<OtpVerification>>> + Send;
}
