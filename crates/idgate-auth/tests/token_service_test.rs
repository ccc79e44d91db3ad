//! Integration tests for the token service.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use idgate_auth::config::AuthConfig;
use idgate_auth::error::AuthError;
use idgate_auth::service::TokenService;
use idgate_auth::token::{self, TokenClaims};
use idgate_core::clock::ManualClock;
use idgate_core::error::{IdgateError, IdgateResult};
use idgate_core::models::audience_secret::audience_for;
use idgate_core::models::revoked_token::RevokedToken;
use idgate_core::models::user::{CreateUser, User};
use idgate_core::repository::{
    RevokedTokenRepository, Transactional, UnitOfWork, UserRepository,
};
use idgate_db::Repositories;
use idgate_db::repository::{
    SurrealAudienceSecretRepository, SurrealRevokedTokenRepository, SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Tokens = TokenService<
    SurrealUserRepository<Db>,
    SurrealAudienceSecretRepository<Db>,
    SurrealRevokedTokenRepository<Db>,
>;

/// Spin up in-memory DB, run migrations, create one user.
async fn setup() -> (Tokens, ManualClock, User, Repositories<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    idgate_db::run_migrations(&db).await.unwrap();
    let repos = Repositories::new(db);

    let user = repos
        .users
        .create(CreateUser {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            phone_number: "+821012345678".into(),
            nickname: "ally".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            email_confirmation_code: Uuid::new_v4().to_string(),
        })
        .await
        .unwrap();

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
    let service = TokenService::new(
        repos.users.clone(),
        repos.audience_secrets.clone(),
        repos.revoked_tokens.clone(),
        Arc::new(clock.clone()),
        AuthConfig::default(),
    );

    (service, clock, user, repos)
}

/// Denylist whose inserts always fail with the given error.
#[derive(Clone)]
struct FailingDenylist {
    error: IdgateError,
}

impl RevokedTokenRepository for FailingDenylist {
    async fn exists(&self, _jti: &str) -> IdgateResult<bool> {
        Ok(false)
    }

    async fn insert(&self, _entry: RevokedToken) -> IdgateResult<()> {
        Err(self.error.clone())
    }
}

fn with_denylist(
    repos: &Repositories<Db>,
    clock: &ManualClock,
    error: IdgateError,
) -> TokenService<SurrealUserRepository<Db>, SurrealAudienceSecretRepository<Db>, FailingDenylist>
{
    TokenService::new(
        repos.users.clone(),
        repos.audience_secrets.clone(),
        FailingDenylist { error },
        Arc::new(clock.clone()),
        AuthConfig::default(),
    )
}

// -----------------------------------------------------------------------
// Issue / GetUser
// -----------------------------------------------------------------------

#[tokio::test]
async fn issued_access_token_resolves_to_user() {
    let (tokens, _clock, user, _repos) = setup().await;

    let pair = tokens.issue(&user).await.unwrap();
    let resolved = tokens.get_user(&pair.access_token).await.unwrap();

    assert_eq!(resolved.id, user.id);
    assert_eq!(resolved.email, user.email);
}

#[tokio::test]
async fn only_refresh_token_carries_jti() {
    let (tokens, _clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    let access = token::peek(&pair.access_token).unwrap();
    let refresh = token::peek(&pair.refresh_token).unwrap();

    assert!(access.jti.is_none());
    assert!(refresh.jti.is_some());
    assert_eq!(access.aud, vec![audience_for(user.id)]);
    assert_eq!(access.exp - access.iat, 600);
    assert_eq!(refresh.exp - refresh.iat, 1_209_600);
}

#[tokio::test]
async fn concurrent_first_issuance_shares_one_secret() {
    let (tokens, _clock, user, _repos) = setup().await;

    let (a, b) = tokio::join!(tokens.issue(&user), tokens.issue(&user));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(tokens.get_user(&a.access_token).await.is_ok());
    assert!(tokens.get_user(&b.access_token).await.is_ok());
}

#[tokio::test]
async fn access_token_honours_ttl_boundary() {
    let (tokens, clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    clock.advance(Duration::seconds(600));
    assert!(tokens.get_user(&pair.access_token).await.is_ok());

    clock.advance(Duration::seconds(1));
    let err = tokens.get_user(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
}

#[tokio::test]
async fn expiry_is_checked_in_whole_seconds() {
    let (tokens, clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    clock.advance(Duration::seconds(600) + Duration::milliseconds(500));
    assert!(tokens.get_user(&pair.access_token).await.is_ok());

    clock.advance(Duration::milliseconds(500));
    let err = tokens.get_user(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
}

// -----------------------------------------------------------------------
// Validation contract
// -----------------------------------------------------------------------

#[tokio::test]
async fn token_signed_with_foreign_secret_is_rejected() {
    let (tokens, _clock, user, _repos) = setup().await;
    let genuine = tokens.issue(&user).await.unwrap();

    let claims = token::peek(&genuine.access_token).unwrap();
    let forged = token::sign(&claims, b"attacker-secret").unwrap();

    let err = tokens.get_user(&forged).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

#[tokio::test]
async fn wrong_issuer_is_rejected() {
    let (tokens, _clock, user, _repos) = setup().await;
    tokens.issue(&user).await.unwrap();

    let claims = TokenClaims {
        iss: "https://elsewhere.example".into(),
        aud: vec![audience_for(user.id)],
        iat: 0,
        exp: i64::MAX,
        jti: None,
        user_id: user.id.to_string(),
    };
    let token = token::sign(&claims, b"irrelevant").unwrap();

    let err = tokens.get_user(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

#[tokio::test]
async fn audience_without_secret_is_rejected() {
    let (tokens, _clock, _user, _repos) = setup().await;
    let stranger = Uuid::new_v4();

    let claims = TokenClaims {
        iss: AuthConfig::default().issuer,
        aud: vec![audience_for(stranger)],
        iat: 0,
        exp: i64::MAX,
        jti: None,
        user_id: stranger.to_string(),
    };
    let token = token::sign(&claims, b"guess").unwrap();

    let err = tokens.get_user(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let (tokens, _clock, _user, _repos) = setup().await;

    let err = tokens.get_user("definitely-not-a-jwt").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

// -----------------------------------------------------------------------
// Refresh
// -----------------------------------------------------------------------

#[tokio::test]
async fn refresh_issues_working_pair() {
    let (tokens, clock, user, _repos) = setup().await;
    let first = tokens.issue(&user).await.unwrap();

    clock.advance(Duration::seconds(30));
    let second = tokens.refresh(&first.refresh_token).await.unwrap();

    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(tokens.get_user(&second.access_token).await.unwrap().id, user.id);
    assert!(tokens.refresh(&second.refresh_token).await.is_ok());
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let (tokens, _clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    tokens.refresh(&pair.refresh_token).await.unwrap();
    let err = tokens.refresh(&pair.refresh_token).await.unwrap_err();

    assert!(matches!(err, AuthError::TokenRevoked), "got {err:?}");
}

#[tokio::test]
async fn replay_after_expiry_is_still_revoked() {
    let (tokens, clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    tokens.refresh(&pair.refresh_token).await.unwrap();
    clock.advance(Duration::days(15));

    let err = tokens.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked), "got {err:?}");
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let (tokens, clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    clock.advance(Duration::days(14) + Duration::seconds(1));

    let err = tokens.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let (tokens, _clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    let err = tokens.refresh(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

// -----------------------------------------------------------------------
// Revoke / RevokeAll
// -----------------------------------------------------------------------

#[tokio::test]
async fn revoke_is_idempotent() {
    let (tokens, _clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    tokens.revoke(&pair.refresh_token).await.unwrap();
    tokens.revoke(&pair.refresh_token).await.unwrap();

    let err = tokens.refresh(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenRevoked), "got {err:?}");
}

#[tokio::test]
async fn revoke_reports_storage_failure() {
    let (_tokens, clock, user, repos) = setup().await;
    let tokens = with_denylist(&repos, &clock, IdgateError::Database("disk full".into()));
    let pair = tokens.issue(&user).await.unwrap();

    let err = tokens.revoke(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::RevocationFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn revoke_treats_conflict_as_done() {
    let (_tokens, clock, user, repos) = setup().await;
    let conflict = IdgateError::AlreadyExists {
        entity: "revoked_token".into(),
    };
    let tokens = with_denylist(&repos, &clock, conflict);
    let pair = tokens.issue(&user).await.unwrap();

    assert!(tokens.revoke(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn revoke_requires_jti() {
    let (tokens, _clock, user, _repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    let err = tokens.revoke(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

#[tokio::test]
async fn revoke_all_invalidates_every_outstanding_token() {
    let (tokens, _clock, user, _repos) = setup().await;
    let first = tokens.issue(&user).await.unwrap();
    let second = tokens.issue(&user).await.unwrap();

    tokens.revoke_all(user.id, None).await.unwrap();

    for pair in [&first, &second] {
        let err = tokens.get_user(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
        let err = tokens.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
    }

    // A new secret is derived on the next issuance; old tokens stay dead.
    let fresh = tokens.issue(&user).await.unwrap();
    assert!(tokens.get_user(&fresh.access_token).await.is_ok());
    assert!(tokens.get_user(&first.access_token).await.is_err());
}

#[tokio::test]
async fn reissue_at_same_instant_keeps_revoked_tokens_dead() {
    let (tokens, _clock, user, _repos) = setup().await;
    let old = tokens.issue(&user).await.unwrap();

    tokens.revoke_all(user.id, None).await.unwrap();
    let fresh = tokens.issue(&user).await.unwrap();

    assert!(tokens.get_user(&fresh.access_token).await.is_ok());
    let err = tokens.get_user(&old.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
    let err = tokens.refresh(&old.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)), "got {err:?}");
}

#[tokio::test]
async fn revoke_all_in_transaction_waits_for_commit() {
    let (tokens, _clock, user, repos) = setup().await;
    let pair = tokens.issue(&user).await.unwrap();

    let mut tx = repos.users.begin();
    tokens.revoke_all(user.id, Some(&mut tx)).await.unwrap();
    assert!(tokens.get_user(&pair.access_token).await.is_ok());

    tx.commit().await.unwrap();
    assert!(tokens.get_user(&pair.access_token).await.is_err());
}
