//! Integration tests for the audience secret store and the refresh token
//! denylist using in-memory SurrealDB.

use chrono::Utc;
use idgate_core::error::IdgateError;
use idgate_core::models::audience_secret::CreateAudienceSecret;
use idgate_core::models::revoked_token::RevokedToken;
use idgate_core::repository::{
    AudienceSecretRepository, RevokedTokenRepository, Transactional, UnitOfWork,
};
use idgate_db::repository::{SurrealAudienceSecretRepository, SurrealRevokedTokenRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    idgate_db::run_migrations(&db).await.unwrap();
    db
}

fn secret(audience: &str, bytes: &[u8]) -> CreateAudienceSecret {
    CreateAudienceSecret {
        audience: audience.into(),
        secret: bytes.to_vec(),
        created_at: Utc::now(),
    }
}

// -----------------------------------------------------------------------
// Audience secrets
// -----------------------------------------------------------------------

#[tokio::test]
async fn insert_then_get_secret() {
    let repo = SurrealAudienceSecretRepository::new(setup().await);

    let stored = repo.insert_or_get(secret("user:1", b"first")).await.unwrap();
    assert_eq!(stored.secret, b"first");

    let fetched = repo.get_by_audience("user:1").await.unwrap();
    assert_eq!(fetched.secret, b"first");
}

#[tokio::test]
async fn second_insert_returns_existing_secret() {
    let repo = SurrealAudienceSecretRepository::new(setup().await);

    repo.insert_or_get(secret("user:1", b"winner")).await.unwrap();
    let loser = repo.insert_or_get(secret("user:1", b"loser")).await.unwrap();

    assert_eq!(loser.secret, b"winner");
}

#[tokio::test]
async fn missing_secret_is_not_found() {
    let repo = SurrealAudienceSecretRepository::new(setup().await);

    let err = repo.get_by_audience("user:nobody").await.unwrap_err();
    assert!(matches!(err, IdgateError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn delete_secret_immediately() {
    let repo = SurrealAudienceSecretRepository::new(setup().await);
    repo.insert_or_get(secret("user:1", b"s")).await.unwrap();
    repo.insert_or_get(secret("user:2", b"t")).await.unwrap();

    repo.delete_by_audience("user:1", None).await.unwrap();

    assert!(repo.get_by_audience("user:1").await.is_err());
    assert!(repo.get_by_audience("user:2").await.is_ok());
}

#[tokio::test]
async fn delete_secret_inside_transaction() {
    let repo = SurrealAudienceSecretRepository::new(setup().await);
    repo.insert_or_get(secret("user:1", b"s")).await.unwrap();

    let mut tx = repo.begin();
    repo.delete_by_audience("user:1", Some(&mut tx)).await.unwrap();
    assert!(repo.get_by_audience("user:1").await.is_ok());

    tx.commit().await.unwrap();
    assert!(repo.get_by_audience("user:1").await.is_err());
}

// -----------------------------------------------------------------------
// Denylist
// -----------------------------------------------------------------------

#[tokio::test]
async fn revoked_jti_is_found() {
    let repo = SurrealRevokedTokenRepository::new(setup().await);
    let jti = Uuid::new_v4().to_string();

    assert!(!repo.exists(&jti).await.unwrap());

    repo.insert(RevokedToken {
        jti: jti.clone(),
        user_id: Uuid::new_v4(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    assert!(repo.exists(&jti).await.unwrap());
}

#[tokio::test]
async fn duplicate_revocation_is_a_conflict() {
    let repo = SurrealRevokedTokenRepository::new(setup().await);
    let entry = RevokedToken {
        jti: Uuid::new_v4().to_string(),
        user_id: Uuid::new_v4(),
        created_at: Utc::now(),
    };

    repo.insert(entry.clone()).await.unwrap();
    let err = repo.insert(entry).await.unwrap_err();

    assert!(
        matches!(err, IdgateError::AlreadyExists { .. }),
        "expected AlreadyExists, got {err:?}"
    );
}
