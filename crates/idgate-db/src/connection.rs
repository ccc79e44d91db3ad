//! SurrealDB connection management.

use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::repository::{
    SurrealAudienceSecretRepository, SurrealOtpVerificationRepository,
    SurrealRevokedTokenRepository, SurrealUserRepository,
};
use crate::schema::run_migrations;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "idgate".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Every repository idgate needs, sharing one connection.
#[derive(Clone)]
pub struct Repositories<C: Connection> {
    pub users: SurrealUserRepository<C>,
    pub audience_secrets: SurrealAudienceSecretRepository<C>,
    pub revoked_tokens: SurrealRevokedTokenRepository<C>,
    pub otp_verifications: SurrealOtpVerificationRepository<C>,
}

impl<C: Connection> Repositories<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            users: SurrealUserRepository::new(db.clone()),
            audience_secrets: SurrealAudienceSecretRepository::new(db.clone()),
            revoked_tokens: SurrealRevokedTokenRepository::new(db.clone()),
            otp_verifications: SurrealOtpVerificationRepository::new(db),
        }
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect to SurrealDB, sign in as root and select the configured
    /// namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(config.url.as_str()).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    pub fn repositories(&self) -> Repositories<Client> {
        Repositories::new(self.db.clone())
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
