//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use idgate_core::error::IdgateResult;
use idgate_core::models::user::{CreateUser, User};
use idgate_core::repository::{Transactional, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::transaction::SurrealTransaction;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    name: String,
    email: String,
    phone_number: String,
    nickname: String,
    password_hash: String,
    is_email_verified: bool,
    email_confirmation_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    name: String,
    email: String,
    phone_number: String,
    nickname: String,
    password_hash: String,
    is_email_verified: bool,
    email_confirmation_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            phone_number: self.phone_number,
            nickname: self.nickname,
            password_hash: self.password_hash,
            is_email_verified: self.is_email_verified,
            email_confirmation_code: self.email_confirmation_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::InvalidRow(format!("invalid user UUID: {e}")))?;
        Ok(UserRow {
            name: self.name,
            email: self.email,
            phone_number: self.phone_number,
            nickname: self.nickname,
            password_hash: self.password_hash,
            is_email_verified: self.is_email_verified,
            email_confirmation_code: self.email_confirmation_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id))
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Look a user up by a unique, non-id field.
    async fn get_by_field(&self, field: &'static str, value: &str) -> IdgateResult<User> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE {field} = $value LIMIT 1"
        );

        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("{field}={value}"),
        })?;

        Ok(row.try_into_user()?)
    }
}

impl<C: Connection> Transactional for SurrealUserRepository<C> {
    type Tx = SurrealTransaction<C>;

    fn begin(&self) -> Self::Tx {
        SurrealTransaction::new(self.db.clone())
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> IdgateResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 name = $name, email = $email, \
                 phone_number = $phone_number, \
                 nickname = $nickname, \
                 password_hash = $password_hash, \
                 is_email_verified = false, \
                 email_confirmation_code = $email_confirmation_code",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("phone_number", input.phone_number))
            .bind(("nickname", input.nickname))
            .bind(("password_hash", input.password_hash))
            .bind(("email_confirmation_code", input.email_confirmation_code))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user"))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_id(&self, id: Uuid) -> IdgateResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_email(&self, email: &str) -> IdgateResult<User> {
        self.get_by_field("email", email).await
    }

    async fn get_by_phone_number(&self, phone_number: &str) -> IdgateResult<User> {
        self.get_by_field("phone_number", phone_number).await
    }

    async fn get_by_confirmation_code(&self, code: &str) -> IdgateResult<User> {
        self.get_by_field("email_confirmation_code", code).await
    }

    async fn confirm_email(&self, id: Uuid) -> IdgateResult<User> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 is_email_verified = true, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user"))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    fn set_password_hash(&self, tx: &mut Self::Tx, id: Uuid, password_hash: &str) {
        let id = tx.param(id.to_string());
        let hash = tx.param(password_hash);
        tx.push(format!(
            "UPDATE type::record('user', {id}) SET \
             password_hash = {hash}, updated_at = time::now()"
        ));
    }
}
