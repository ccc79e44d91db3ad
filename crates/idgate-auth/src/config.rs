//! Token, OTP and password configuration.

/// Configuration for the token service, the OTP engine and password
/// hashing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT issuer (`iss` claim). Tokens carrying any other issuer are
    /// rejected.
    pub issuer: String,
    /// Access token lifetime in seconds (default: 600 = 10 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 1_209_600 = 14 days).
    pub refresh_token_lifetime_secs: u64,
    /// Number of digits in an OTP code (default: 6).
    pub otp_code_length: usize,
    /// How long an OTP code may be entered, in seconds (default: 180).
    pub otp_expiry_secs: u64,
    /// How long a verified OTP may be consumed, in seconds (default: 300).
    pub otp_validity_secs: u64,
    /// Attempts allowed per OTP challenge, successful one included
    /// (default: 5).
    pub otp_max_trials: u32,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "https://github.com/idgate/idgate".into(),
            access_token_lifetime_secs: 600,
            refresh_token_lifetime_secs: 1_209_600,
            otp_code_length: 6,
            otp_expiry_secs: 180,
            otp_validity_secs: 300,
            otp_max_trials: 5,
            pepper: None,
        }
    }
}
