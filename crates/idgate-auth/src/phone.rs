//! Phone number parsing and E.164 normalization.

use phonenumber::country::Id;
use phonenumber::{Mode, PhoneNumber};

use crate::error::AuthError;

/// Region assumed for numbers written without a country code.
pub const DEFAULT_REGION: Id = Id::KR;

/// Parse `input` as a valid phone number, returning its E.164 form.
pub fn normalize(input: &str) -> Result<String, AuthError> {
    let number: PhoneNumber =
        phonenumber::parse(Some(DEFAULT_REGION), input).map_err(|_| AuthError::InvalidPhoneNumber)?;
    if !phonenumber::is_valid(&number) {
        return Err(AuthError::InvalidPhoneNumber);
    }
    Ok(number.format().mode(Mode::E164).to_string())
}

/// Accept `input` only if it is already a valid number in E.164 form.
pub fn require_e164(input: &str) -> Result<String, AuthError> {
    let normalized = normalize(input)?;
    if normalized != input {
        return Err(AuthError::InvalidPhoneNumber);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e164_number_is_accepted() {
        assert_eq!(require_e164("+821012345678").unwrap(), "+821012345678");
    }

    #[test]
    fn national_format_normalizes_but_is_not_e164() {
        assert_eq!(normalize("010-1234-5678").unwrap(), "+821012345678");
        assert!(matches!(
            require_e164("010-1234-5678"),
            Err(AuthError::InvalidPhoneNumber)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize("hello").is_err());
        assert!(normalize("").is_err());
        assert!(require_e164("+82 10").is_err());
    }
}
