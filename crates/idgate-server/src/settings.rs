//! Command-line and environment settings.

use clap::Parser;
use idgate_auth::AuthConfig;
use idgate_db::DbConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "idgate", version, about = "idgate identity backend")]
pub struct Settings {
    /// SurrealDB WebSocket address.
    #[arg(long, env = "IDGATE_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "IDGATE_DB_NAMESPACE", default_value = "idgate")]
    pub db_namespace: String,

    #[arg(long, env = "IDGATE_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "IDGATE_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "IDGATE_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// `iss` claim of issued tokens.
    #[arg(long, env = "IDGATE_TOKEN_ISSUER", default_value = "https://github.com/idgate/idgate")]
    pub token_issuer: String,

    /// Access token lifetime in seconds.
    #[arg(long, env = "IDGATE_ACCESS_TOKEN_TTL", default_value_t = 600)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds.
    #[arg(long, env = "IDGATE_REFRESH_TOKEN_TTL", default_value_t = 1_209_600)]
    pub refresh_token_ttl: u64,

    #[arg(long, env = "IDGATE_OTP_CODE_LENGTH", default_value_t = 6)]
    pub otp_code_length: usize,

    /// Seconds an OTP code can be entered.
    #[arg(long, env = "IDGATE_OTP_EXPIRY", default_value_t = 180)]
    pub otp_expiry: u64,

    /// Seconds a verified OTP stays usable.
    #[arg(long, env = "IDGATE_OTP_VALIDITY", default_value_t = 300)]
    pub otp_validity: u64,

    #[arg(long, env = "IDGATE_OTP_MAX_TRIALS", default_value_t = 5)]
    pub otp_max_trials: u32,

    #[arg(long, env = "IDGATE_PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,

    /// SMS gateway endpoint. Messages are only logged when unset.
    #[arg(long, env = "IDGATE_SMS_GATEWAY_URL")]
    pub sms_gateway_url: Option<String>,

    #[arg(long, env = "IDGATE_SMS_GATEWAY_KEY", hide_env_values = true)]
    pub sms_gateway_key: Option<String>,
}

impl Settings {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            issuer: self.token_issuer.clone(),
            access_token_lifetime_secs: self.access_token_ttl,
            refresh_token_lifetime_secs: self.refresh_token_ttl,
            otp_code_length: self.otp_code_length,
            otp_expiry_secs: self.otp_expiry,
            otp_validity_secs: self.otp_validity,
            otp_max_trials: self.otp_max_trials,
            pepper: self.password_pepper.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let settings = Settings::try_parse_from(["idgate"]).unwrap();
        let auth = settings.auth_config();
        let expected = AuthConfig::default();

        assert_eq!(auth.issuer, expected.issuer);
        assert_eq!(auth.access_token_lifetime_secs, expected.access_token_lifetime_secs);
        assert_eq!(auth.refresh_token_lifetime_secs, expected.refresh_token_lifetime_secs);
        assert_eq!(auth.otp_code_length, expected.otp_code_length);
        assert_eq!(auth.otp_expiry_secs, expected.otp_expiry_secs);
        assert_eq!(auth.otp_validity_secs, expected.otp_validity_secs);
        assert_eq!(auth.otp_max_trials, expected.otp_max_trials);
        assert_eq!(settings.db_config().namespace, DbConfig::default().namespace);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "idgate",
            "--access-token-ttl",
            "60",
            "--otp-max-trials",
            "3",
            "--sms-gateway-url",
            "http://sms.local/send",
        ])
        .unwrap();

        assert_eq!(settings.auth_config().access_token_lifetime_secs, 60);
        assert_eq!(settings.auth_config().otp_max_trials, 3);
        assert_eq!(settings.sms_gateway_url.as_deref(), Some("http://sms.local/send"));
    }
}
