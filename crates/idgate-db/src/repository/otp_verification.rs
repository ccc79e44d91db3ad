//! SurrealDB implementation of [`OtpVerificationRepository`].
//!
//! The verification token is the record id, so lookups are point reads.
//! Attempts are written with a conditional `UPDATE ... WHERE trials = $n`
//! which serializes concurrent attempts on one token.
//!
//! The id is bound as `$handle`: SurrealDB reserves `$token`.

use chrono::{DateTime, Utc};
use idgate_core::error::IdgateResult;
use idgate_core::models::otp_verification::{
    CreateOtpVerification, OtpAttempt, OtpVerification,
};
use idgate_core::repository::OtpVerificationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OtpVerificationRow {
    phone_number: String,
    otp_code: String,
    expires_at: DateTime<Utc>,
    trials: u32,
    valid_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl OtpVerificationRow {
    fn into_verification(self, token: String) -> OtpVerification {
        OtpVerification {
            token,
            phone_number: self.phone_number,
            otp_code: self.otp_code,
            expires_at: self.expires_at,
            trials: self.trials,
            valid_until: self.valid_until,
            created_at: self.created_at,
        }
    }
}

/// SurrealDB implementation of the OTP verification store.
#[derive(Clone)]
pub struct SurrealOtpVerificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOtpVerificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OtpVerificationRepository for SurrealOtpVerificationRepository<C> {
    async fn create(&self, input: CreateOtpVerification) -> IdgateResult<OtpVerification> {
        let result = self
            .db
            .query(
                "CREATE type::record('otp_verification', $handle) SET \
                 phone_number = $phone_number, \
                 otp_code = $otp_code, \
                 expires_at = $expires_at, \
                 trials = 0, \
                 valid_until = NONE, \
                 created_at = $created_at",
            )
            .bind(("handle", input.token.clone()))
            .bind(("phone_number", input.phone_number))
            .bind(("otp_code", input.otp_code))
            .bind(("expires_at", input.expires_at))
            .bind(("created_at", input.created_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "otp_verification"))?;

        let rows: Vec<OtpVerificationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "otp_verification".into(),
            id: input.token.clone(),
        })?;

        Ok(row.into_verification(input.token))
    }

    async fn get_by_token(&self, token: &str) -> IdgateResult<OtpVerification> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('otp_verification', $handle)")
            .bind(("handle", token.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OtpVerificationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "otp_verification".into(),
            id: token.to_string(),
        })?;

        Ok(row.into_verification(token.to_string()))
    }

    async fn record_attempt(
        &self,
        token: &str,
        attempt: OtpAttempt,
    ) -> IdgateResult<Option<OtpVerification>> {
        let mut builder = match attempt.valid_until {
            Some(valid_until) => self
                .db
                .query(
                    "UPDATE type::record('otp_verification', $handle) SET \
                     trials = $next, valid_until = $valid_until \
                     WHERE trials = $observed",
                )
                .bind(("valid_until", valid_until)),
            None => self.db.query(
                "UPDATE type::record('otp_verification', $handle) SET \
                 trials = $next WHERE trials = $observed",
            ),
        };
        builder = builder
            .bind(("handle", token.to_string()))
            .bind(("next", attempt.observed_trials + 1))
            .bind(("observed", attempt.observed_trials));

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "otp_verification"))?;

        let rows: Vec<OtpVerificationRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.into_verification(token.to_string())))
    }
}
