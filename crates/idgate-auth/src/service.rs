//! Token service: issuance, refresh, revocation and secret rotation of
//! access/refresh token pairs.

use std::sync::Arc;

use idgate_core::clock::Clock;
use idgate_core::error::IdgateError;
use idgate_core::models::audience_secret::{CreateAudienceSecret, audience_for};
use idgate_core::models::revoked_token::RevokedToken;
use idgate_core::models::user::User;
use idgate_core::repository::{AudienceSecretRepository, RevokedTokenRepository, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::{self, TokenClaims, TokenPair};

/// Token service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct TokenService<U, S, R> {
    users: U,
    secrets: S,
    revoked: R,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl<U, S, R> TokenService<U, S, R>
where
    U: UserRepository,
    S: AudienceSecretRepository,
    R: RevokedTokenRepository,
{
    pub fn new(users: U, secrets: S, revoked: R, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        Self {
            users,
            secrets,
            revoked,
            clock,
            config,
        }
    }

    /// Issue a fresh access/refresh pair for `user`, creating the
    /// user's signing secret on first use.
    pub async fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let audience = audience_for(user.id);
        let secret = self.resolve_secret(&audience, user).await?;

        let iat = self.clock.now().timestamp();
        let access = TokenClaims {
            iss: self.config.issuer.clone(),
            aud: vec![audience.clone()],
            iat,
            exp: iat + self.config.access_token_lifetime_secs as i64,
            jti: None,
            user_id: user.id.to_string(),
        };
        let refresh = TokenClaims {
            exp: iat + self.config.refresh_token_lifetime_secs as i64,
            jti: Some(Uuid::new_v4().to_string()),
            ..access.clone()
        };

        Ok(TokenPair {
            access_token: token::sign(&access, &secret)?,
            refresh_token: token::sign(&refresh, &secret)?,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// revoked before the new pair is issued and can never be used
    /// again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let (claims, user_id) = self.authenticate(refresh_token).await?;
        let jti = claims
            .jti
            .clone()
            .ok_or_else(|| AuthError::InvalidClaims("refresh token has no jti".into()))?;

        // Replay is rejected even once the token has expired.
        if self.revoked.exists(&jti).await? {
            warn!(%user_id, "revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }
        self.check_expiry(&claims)?;

        let user = self.load_user(user_id).await?;

        match self.revoked.insert(self.revocation(jti, user_id)).await {
            Ok(()) => {}
            // A concurrent refresh of the same token won.
            Err(IdgateError::AlreadyExists { .. }) => return Err(AuthError::TokenRevoked),
            Err(e) => return Err(e.into()),
        }

        debug!(%user_id, "refresh token rotated");
        self.issue(&user).await
    }

    /// Revoke a refresh token. Revoking an already revoked token
    /// succeeds.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let (claims, user_id) = self.authenticate(refresh_token).await?;
        self.check_expiry(&claims)?;
        let jti = claims
            .jti
            .ok_or_else(|| AuthError::InvalidClaims("refresh token has no jti".into()))?;

        match self.revoked.insert(self.revocation(jti, user_id)).await {
            Ok(()) | Err(IdgateError::AlreadyExists { .. }) => Ok(()),
            Err(e) => {
                warn!(%user_id, error = %e, "failed to record token revocation");
                Err(AuthError::RevocationFailed(e.to_string()))
            }
        }
    }

    /// Delete the signing secret of `user_id`, invalidating every token
    /// issued to them so far. With `tx` the deletion commits together
    /// with the caller's other writes.
    pub async fn revoke_all(&self, user_id: Uuid, tx: Option<&mut S::Tx>) -> Result<(), AuthError> {
        let audience = audience_for(user_id);
        self.secrets.delete_by_audience(&audience, tx).await?;
        info!(%user_id, "all tokens revoked");
        Ok(())
    }

    /// Resolve the user a valid token was issued to.
    pub async fn get_user(&self, token: &str) -> Result<User, AuthError> {
        let (claims, user_id) = self.authenticate(token).await?;
        self.check_expiry(&claims)?;
        self.load_user(user_id).await
    }

    /// Check shape and signature of `token`. Expiry is checked
    /// separately so refresh can report replay ahead of expiry.
    async fn authenticate(&self, token: &str) -> Result<(TokenClaims, Uuid), AuthError> {
        let unverified = token::peek(token)?;
        let user_id = token::check_shape(&unverified, &self.config.issuer)?;

        let secret = match self.secrets.get_by_audience(&unverified.aud[0]).await {
            Ok(s) => s.secret,
            Err(IdgateError::NotFound { .. }) => {
                return Err(AuthError::InvalidClaims(
                    "no signing secret for audience".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let claims = token::verify(token, &secret)?;
        Ok((claims, user_id))
    }

    /// `exp` is a whole-second NumericDate, so a token stays valid until
    /// the clock passes the end of its last second: with `exp = T` a check
    /// at `T + 0.5s` still succeeds and one at `T + 1s` fails.
    fn check_expiry(&self, claims: &TokenClaims) -> Result<(), AuthError> {
        if self.clock.now().timestamp() > claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(())
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        match self.users.get_by_id(user_id).await {
            Ok(user) => Ok(user),
            Err(IdgateError::NotFound { .. }) => {
                Err(AuthError::InvalidClaims("user no longer exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_secret(&self, audience: &str, user: &User) -> Result<Vec<u8>, AuthError> {
        match self.secrets.get_by_audience(audience).await {
            Ok(existing) => Ok(existing.secret),
            Err(IdgateError::NotFound { .. }) => {
                let now = self.clock.now();
                let stored = self
                    .secrets
                    .insert_or_get(CreateAudienceSecret {
                        audience: audience.to_string(),
                        secret: token::derive_secret(
                            &user.password_hash,
                            now,
                            &token::secret_nonce(),
                        ),
                        created_at: now,
                    })
                    .await?;
                debug!(user_id = %user.id, "signing secret created");
                Ok(stored.secret)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn revocation(&self, jti: String, user_id: Uuid) -> RevokedToken {
        RevokedToken {
            jti,
            user_id,
            created_at: self.clock.now(),
        }
    }
}
