//! Identity service: registration, sign-in and account recovery on top
//! of the token service and the OTP engine.

use std::sync::LazyLock;

use idgate_core::error::{IdgateError, IdgateResult};
use idgate_core::models::user::{CreateUser, User};
use idgate_core::repository::{
    AudienceSecretRepository, OtpVerificationRepository, RevokedTokenRepository, Transactional,
    UnitOfWork, UserRepository,
};
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use crate::error::AuthError;
use crate::otp::{OtpChallenge, OtpEngine};
use crate::password::PasswordHasher;
use crate::phone;
use crate::service::TokenService;
use crate::sms::SmsSender;
use crate::token::TokenPair;

const SIGN_IN_FAILURE: &str = "id or password incorrect";

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 20;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+\-$]+@[a-z0-9.\-]+\.[a-z]{2,4}$").expect("email pattern is valid")
});

/// Input for [`IdentityService::register`].
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub verification_token: String,
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to `name`.
    pub nickname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterOutput {
    pub user_id: Uuid,
    /// Must be presented to [`IdentityService::confirm_email`] before the
    /// user can sign in.
    pub email_confirmation_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub nickname: String,
}

impl From<User> for PersonalInfo {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            nickname: user.nickname,
        }
    }
}

pub struct IdentityService<U, S, R, O, M, H> {
    users: U,
    tokens: TokenService<U, S, R>,
    otp: OtpEngine<O, M>,
    hasher: H,
    /// Verified against when the identity is unknown, so sign-in costs
    /// one hash verification either way.
    dummy_hash: Option<String>,
}

impl<U, S, R, O, M, H> IdentityService<U, S, R, O, M, H>
where
    U: UserRepository<Tx = S::Tx>,
    S: AudienceSecretRepository,
    R: RevokedTokenRepository,
    O: OtpVerificationRepository,
    M: SmsSender,
    H: PasswordHasher,
{
    pub fn new(users: U, tokens: TokenService<U, S, R>, otp: OtpEngine<O, M>, hasher: H) -> Self {
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string()).ok();
        Self {
            users,
            tokens,
            otp,
            hasher,
            dummy_hash,
        }
    }

    pub fn tokens(&self) -> &TokenService<U, S, R> {
        &self.tokens
    }

    /// Create an account for the phone number proven by
    /// `verification_token`.
    pub async fn register(&self, input: RegisterInput) -> IdgateResult<RegisterOutput> {
        if input.verification_token.is_empty() {
            return Err(IdgateError::invalid_input("no verification_token"));
        }
        if input.name.is_empty() {
            return Err(IdgateError::invalid_input("no name"));
        }
        validate_email(&input.email)?;
        validate_password(&input.password)?;
        if input.nickname.as_deref() == Some("") {
            return Err(IdgateError::invalid_input("empty nickname"));
        }

        let phone_number = self.consume_verification(&input.verification_token).await?;

        if exists(self.users.get_by_phone_number(&phone_number).await)? {
            return Err(IdgateError::invalid_input("already used phone number"));
        }
        if exists(self.users.get_by_email(&input.email).await)? {
            return Err(IdgateError::invalid_input("already used email"));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let email_confirmation_code = Uuid::new_v4().to_string();
        let nickname = input.nickname.unwrap_or_else(|| input.name.clone());

        let user = self
            .users
            .create(CreateUser {
                name: input.name,
                email: input.email,
                phone_number,
                nickname,
                password_hash,
                email_confirmation_code: email_confirmation_code.clone(),
            })
            .await
            .map_err(|e| match e {
                // Lost a race against a concurrent registration.
                IdgateError::AlreadyExists { .. } => {
                    IdgateError::invalid_input("already used phone number or email")
                }
                other => other,
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(RegisterOutput {
            user_id: user.id,
            email_confirmation_code,
        })
    }

    pub async fn confirm_email(&self, confirmation_code: &str) -> IdgateResult<()> {
        if confirmation_code.is_empty() {
            return Err(IdgateError::invalid_input("no confirmation code"));
        }

        let user = match self.users.get_by_confirmation_code(confirmation_code).await {
            Ok(user) => user,
            Err(IdgateError::NotFound { .. }) => {
                return Err(IdgateError::invalid_input("invalid confirmation code"));
            }
            Err(e) => return Err(e),
        };
        if user.is_email_verified {
            return Err(IdgateError::AlreadyInState {
                reason: "email already confirmed".into(),
            });
        }

        self.users.confirm_email(user.id).await?;
        info!(user_id = %user.id, "email confirmed");
        Ok(())
    }

    /// Sign in with a phone number or an email address.
    ///
    /// Unknown identities and wrong passwords fail identically.
    pub async fn sign_in(&self, id: &str, password: &str) -> IdgateResult<TokenPair> {
        if id.is_empty() {
            return Err(IdgateError::invalid_input("no id"));
        }
        if password.is_empty() {
            return Err(IdgateError::invalid_input("no password"));
        }

        let lookup = if let Ok(phone_number) = phone::normalize(id) {
            self.users.get_by_phone_number(&phone_number).await
        } else if id.contains('@') {
            if !is_valid_email(id) {
                return Err(IdgateError::invalid_input("invalid id format"));
            }
            self.users.get_by_email(id).await
        } else {
            return Err(IdgateError::invalid_input("unknown id format"));
        };

        let user = match lookup {
            Ok(user) => user,
            Err(IdgateError::NotFound { .. }) => {
                if let Some(dummy) = &self.dummy_hash {
                    let _ = self.hasher.verify(password, dummy);
                }
                return Err(IdgateError::unauthenticated(SIGN_IN_FAILURE));
            }
            Err(e) => return Err(e),
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            info!(user_id = %user.id, "sign-in rejected: wrong password");
            return Err(IdgateError::unauthenticated(SIGN_IN_FAILURE));
        }
        if !user.is_email_verified {
            return Err(IdgateError::unauthenticated("email not verified yet"));
        }

        let pair = self.tokens.issue(&user).await?;
        info!(user_id = %user.id, "user signed in");
        Ok(pair)
    }

    pub async fn sign_out(&self, refresh_token: &str) -> IdgateResult<()> {
        if refresh_token.is_empty() {
            return Err(IdgateError::invalid_input("no refresh_token"));
        }
        Ok(self.tokens.revoke(refresh_token).await?)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> IdgateResult<TokenPair> {
        if refresh_token.is_empty() {
            return Err(IdgateError::invalid_input("no refresh_token"));
        }
        self.tokens
            .refresh(refresh_token)
            .await
            .map_err(|e| token_failure(e, "invalid refresh token"))
    }

    pub async fn request_sms_otp(&self, phone_number: &str) -> IdgateResult<OtpChallenge> {
        if phone_number.is_empty() {
            return Err(IdgateError::invalid_input("no phone_number"));
        }
        Ok(self.otp.request(phone_number).await?)
    }

    pub async fn verify_sms_otp(&self, verification_token: &str, code: &str) -> IdgateResult<()> {
        Ok(self.otp.verify(verification_token, code).await?)
    }

    /// Replace the password of the account owning the phone number
    /// proven by `verification_token` and revoke all its tokens.
    pub async fn reset_password(
        &self,
        verification_token: &str,
        new_password: &str,
    ) -> IdgateResult<()> {
        if verification_token.is_empty() {
            return Err(IdgateError::invalid_input("no verification_token"));
        }
        validate_password(new_password)?;
        let password_hash = self.hasher.hash(new_password)?;

        let phone_number = self.consume_verification(verification_token).await?;
        let user = self.users.get_by_phone_number(&phone_number).await?;

        let mut tx = self.users.begin();
        self.users.set_password_hash(&mut tx, user.id, &password_hash);
        self.tokens.revoke_all(user.id, Some(&mut tx)).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn get_my_personal_info(&self, access_token: &str) -> IdgateResult<PersonalInfo> {
        if access_token.is_empty() {
            return Err(IdgateError::invalid_input("no access_token"));
        }
        let user = self
            .tokens
            .get_user(access_token)
            .await
            .map_err(|e| token_failure(e, "invalid token"))?;
        Ok(user.into())
    }

    async fn consume_verification(&self, verification_token: &str) -> IdgateResult<String> {
        self.otp
            .consume(verification_token)
            .await
            .map_err(|e| match e {
                AuthError::VerificationNotFound => {
                    IdgateError::invalid_input("verification not found")
                }
                AuthError::InvalidOrExpiredVerification => {
                    IdgateError::invalid_input("invalid verification")
                }
                other => other.into(),
            })
    }
}

/// Collapse token validation failures into one outward reason.
fn token_failure(err: AuthError, reason: &str) -> IdgateError {
    match err {
        AuthError::TokenExpired | AuthError::InvalidClaims(_) | AuthError::TokenRevoked => {
            IdgateError::unauthenticated(reason)
        }
        other => other.into(),
    }
}

/// `Ok(true)` if the lookup found a row, `Ok(false)` if it did not.
fn exists(lookup: IdgateResult<User>) -> IdgateResult<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(IdgateError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn validate_email(email: &str) -> IdgateResult<()> {
    if email.is_empty() {
        return Err(IdgateError::invalid_input("no email"));
    }
    if !is_valid_email(email) {
        return Err(IdgateError::invalid_input("invalid email"));
    }
    Ok(())
}

/// 8 to 20 ASCII letters, digits and symbols, with at least one of each.
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return false;
    }

    let (mut alpha, mut digit, mut special) = (false, false, false);
    for c in password.chars() {
        if c.is_ascii_alphabetic() {
            alpha = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else if c.is_ascii_punctuation() {
            special = true;
        } else {
            return false;
        }
    }
    alpha && digit && special
}

fn validate_password(password: &str) -> IdgateResult<()> {
    if password.is_empty() {
        return Err(IdgateError::invalid_input("no password"));
    }
    if !is_valid_password(password) {
        return Err(IdgateError::invalid_input("invalid password"));
    }
    Ok(())
}
