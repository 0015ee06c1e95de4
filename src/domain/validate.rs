//! Client-side input validation.
//!
//! Submission forms reject malformed input before any request is issued;
//! every failure carries a message suitable for direct display.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::DomainError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_HANDLE_LEN: usize = 32;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$").expect("valid email regex")
});

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid handle regex"));

/// Validate an email address for sign-up and sign-in forms.
///
/// The pattern requires a dotted domain, so `foo@bar` is rejected while
/// `foo@bar.com` passes.
pub fn email(input: &str) -> Result<(), DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("email must not be empty"));
    }
    if !EMAIL_RE.is_match(trimmed) {
        return Err(DomainError::validation(format!(
            "`{trimmed}` is not a valid email address"
        )));
    }
    Ok(())
}

/// Validate a password and its confirmation field together.
pub fn password(password: &str, confirmation: &str) -> Result<(), DomainError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password != confirmation {
        return Err(DomainError::validation("passwords do not match"));
    }
    Ok(())
}

/// Validate a profile handle: lowercase alphanumerics and underscores.
pub fn handle(input: &str) -> Result<(), DomainError> {
    if input.is_empty() {
        return Err(DomainError::validation("handle must not be empty"));
    }
    if input.len() > MAX_HANDLE_LEN {
        return Err(DomainError::validation(format!(
            "handle must be at most {MAX_HANDLE_LEN} characters"
        )));
    }
    if !HANDLE_RE.is_match(input) {
        return Err(DomainError::validation(
            "handle may only contain lowercase letters, digits and underscores",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_requires_dotted_domain() {
        assert!(email("foo@bar").is_err());
        assert!(email("foo@bar.com").is_ok());
    }

    #[test]
    fn email_rejects_empty_and_whitespace() {
        assert!(email("").is_err());
        assert!(email("   ").is_err());
    }

    #[test]
    fn email_trims_surrounding_whitespace() {
        assert!(email("  reader@example.org  ").is_ok());
    }

    #[test]
    fn password_enforces_length_and_match() {
        assert!(password("short", "short").is_err());
        assert!(password("long-enough", "different").is_err());
        assert!(password("long-enough", "long-enough").is_ok());
    }

    #[test]
    fn handle_charset() {
        assert!(handle("book_worm42").is_ok());
        assert!(handle("BookWorm").is_err());
        assert!(handle("has space").is_err());
        assert!(handle("").is_err());
    }
}
