//! SurrealDB implementation of [`RevokedTokenRepository`].

use idgate_core::error::IdgateResult;
use idgate_core::models::revoked_token::RevokedToken;
use idgate_core::repository::RevokedTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the refresh-token denylist.
#[derive(Clone)]
pub struct SurrealRevokedTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRevokedTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RevokedTokenRepository for SurrealRevokedTokenRepository<C> {
    async fn exists(&self, jti: &str) -> IdgateResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM revoked_token \
                 WHERE jti = $jti GROUP ALL",
            )
            .bind(("jti", jti.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn insert(&self, entry: RevokedToken) -> IdgateResult<()> {
        self.db
            .query(
                "CREATE revoked_token SET \
                 jti = $jti, \
                 user_id = $user_id, \
                 created_at = $created_at",
            )
            .bind(("jti", entry.jti))
            .bind(("user_id", entry.user_id.to_string()))
            .bind(("created_at", entry.created_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "revoked_token"))?;

        Ok(())
    }
}
