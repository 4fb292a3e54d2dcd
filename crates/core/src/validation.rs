//! Input validation for credential flows.
//!
//! Every check runs locally before a network call so malformed input never
//! leaves the process.

use crate::error::DomainError;

/// Basic email shape check: exactly one `@` with non-empty local and domain
/// parts, no whitespace. Full RFC parsing stays the provider's problem.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation("email must not be empty"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email must not contain whitespace"));
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(())
}

/// Verification codes (MFA and email challenges) are six ASCII digits.
pub fn validate_verification_code(code: &str) -> Result<(), DomainError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(
            "verification code must be 6 digits",
        ));
    }
    Ok(())
}

/// Password strength policy.
///
/// One policy for every flow: 10+ characters, mixed case, a digit, and a
/// special character (any non-alphanumeric counts). The minimum length is
/// overridable per deployment; the character classes are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 10 }
    }
}

/// Per-rule outcome of a password check, shaped for a live requirements
/// checklist on reset/verification forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordReport {
    pub long_enough: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_digit: bool,
    pub has_special: bool,
}

impl PasswordReport {
    pub fn is_satisfied(&self) -> bool {
        self.long_enough
            && self.has_uppercase
            && self.has_lowercase
            && self.has_digit
            && self.has_special
    }
}

impl PasswordPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn report(&self, password: &str) -> PasswordReport {
        PasswordReport {
            long_enough: password.chars().count() >= self.min_length,
            has_uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            has_lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
            has_digit: password.chars().any(|c| c.is_ascii_digit()),
            has_special: password.chars().any(|c| !c.is_alphanumeric()),
        }
    }

    /// Validate a password, reporting the first unmet rule in checklist order.
    pub fn check(&self, password: &str) -> Result<(), DomainError> {
        let report = self.report(password);
        if report.is_satisfied() {
            return Ok(());
        }
        let msg = if !report.long_enough {
            format!("password must be at least {} characters", self.min_length)
        } else if !report.has_uppercase {
            "password must contain an uppercase letter".to_string()
        } else if !report.has_lowercase {
            "password must contain a lowercase letter".to_string()
        } else if !report.has_digit {
            "password must contain a digit".to_string()
        } else {
            "password must contain a special character".to_string()
        };
        Err(DomainError::validation(msg))
    }
}
