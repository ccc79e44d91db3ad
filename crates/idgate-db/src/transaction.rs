//! Client-side write batches executed as one SurrealDB transaction.

use idgate_core::error::IdgateResult;
use idgate_core::repository::UnitOfWork;
use surrealdb::{Connection, Surreal};
use tracing::debug;

use crate::error::DbError;

/// Statements enlisted by one or more repositories, sent to the server
/// wrapped in `BEGIN TRANSACTION` / `COMMIT TRANSACTION` on commit.
pub struct SurrealTransaction<C: Connection> {
    db: Surreal<C>,
    statements: Vec<String>,
    params: Vec<(String, String)>,
}

impl<C: Connection> SurrealTransaction<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            statements: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Register a bound value and return the `$name` to reference it by.
    ///
    /// Names are unique within the transaction, so statements from
    /// different repositories never collide.
    pub fn param(&mut self, value: impl Into<String>) -> String {
        let name = format!("p{}", self.params.len());
        self.params.push((name.clone(), value.into()));
        format!("${name}")
    }

    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn render(&self) -> String {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for statement in &self.statements {
            sql.push_str(statement);
            sql.push_str(";\n");
        }
        sql.push_str("COMMIT TRANSACTION;");
        sql
    }
}

impl<C: Connection> UnitOfWork for SurrealTransaction<C> {
    async fn commit(self) -> IdgateResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        let sql = self.render();
        debug!(statements = self.statements.len(), "Committing transaction");

        let mut builder = self.db.query(sql);
        for (name, value) in self.params {
            builder = builder.bind((name, value));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(e, "transaction"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surrealdb::engine::local::{Db, Mem};

    async fn db() -> Surreal<Db> {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        db
    }

    #[tokio::test]
    async fn params_are_numbered_in_order() {
        let mut tx = SurrealTransaction::new(db().await);
        assert_eq!(tx.param("a"), "$p0");
        assert_eq!(tx.param("b"), "$p1");
    }

    #[tokio::test]
    async fn render_wraps_statements() {
        let mut tx = SurrealTransaction::new(db().await);
        let p = tx.param("x");
        tx.push(format!("DELETE thing WHERE name = {p}"));
        assert_eq!(
            tx.render(),
            "BEGIN TRANSACTION;\nDELETE thing WHERE name = $p0;\nCOMMIT TRANSACTION;"
        );
    }

    #[tokio::test]
    async fn empty_commit_is_a_no_op() {
        let tx = SurrealTransaction::new(db().await);
        assert!(tx.is_empty());
        tx.commit().await.unwrap();
    }
}
