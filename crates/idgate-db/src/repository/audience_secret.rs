//! SurrealDB implementation of [`AudienceSecretRepository`].
//!
//! Secrets are stored base64-encoded, one row per audience, guarded by
//! the `idx_audience_secret_audience` UNIQUE index.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use idgate_core::error::{IdgateError, IdgateResult};
use idgate_core::models::audience_secret::{AudienceSecret, CreateAudienceSecret};
use idgate_core::repository::{AudienceSecretRepository, Transactional};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;
use crate::transaction::SurrealTransaction;

#[derive(Debug, SurrealValue)]
struct AudienceSecretRow {
    audience: String,
    secret: String,
    created_at: DateTime<Utc>,
}

impl AudienceSecretRow {
    fn try_into_secret(self) -> Result<AudienceSecret, DbError> {
        let secret = STANDARD
            .decode(&self.secret)
            .map_err(|e| DbError::InvalidRow(format!("invalid secret encoding: {e}")))?;
        Ok(AudienceSecret {
            audience: self.audience,
            secret,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the audience secret store.
#[derive(Clone)]
pub struct SurrealAudienceSecretRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAudienceSecretRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> Transactional for SurrealAudienceSecretRepository<C> {
    type Tx = SurrealTransaction<C>;

    fn begin(&self) -> Self::Tx {
        SurrealTransaction::new(self.db.clone())
    }
}

impl<C: Connection> AudienceSecretRepository for SurrealAudienceSecretRepository<C> {
    async fn get_by_audience(&self, audience: &str) -> IdgateResult<AudienceSecret> {
        let mut result = self
            .db
            .query("SELECT * FROM audience_secret WHERE audience = $audience LIMIT 1")
            .bind(("audience", audience.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AudienceSecretRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audience_secret".into(),
            id: audience.to_string(),
        })?;

        Ok(row.try_into_secret()?)
    }

    async fn insert_or_get(&self, input: CreateAudienceSecret) -> IdgateResult<AudienceSecret> {
        let result = self
            .db
            .query(
                "CREATE audience_secret SET \
                 audience = $audience, \
                 secret = $secret, \
                 created_at = $created_at",
            )
            .bind(("audience", input.audience.clone()))
            .bind(("secret", STANDARD.encode(&input.secret)))
            .bind(("created_at", input.created_at))
            .await
            .map_err(DbError::from)?;

        match result
            .check()
            .map_err(|e| DbError::from_statement(e, "audience_secret"))
        {
            Ok(mut result) => {
                let rows: Vec<AudienceSecretRow> = result.take(0).map_err(DbError::from)?;
                match rows.into_iter().next() {
                    Some(row) => Ok(row.try_into_secret()?),
                    None => self.get_by_audience(&input.audience).await,
                }
            }
            Err(DbError::Conflict { .. }) => {
                debug!(audience = %input.audience, "Secret created concurrently, reusing it");
                self.get_by_audience(&input.audience).await
            }
            Err(e) => Err(IdgateError::from(e)),
        }
    }

    async fn delete_by_audience(
        &self,
        audience: &str,
        tx: Option<&mut Self::Tx>,
    ) -> IdgateResult<()> {
        if let Some(tx) = tx {
            let audience = tx.param(audience);
            tx.push(format!("DELETE audience_secret WHERE audience = {audience}"));
            return Ok(());
        }

        self.db
            .query("DELETE audience_secret WHERE audience = $audience")
            .bind(("audience", audience.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "audience_secret"))?;

        Ok(())
    }
}
