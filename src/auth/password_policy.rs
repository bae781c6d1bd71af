/*!
 * # Password Policy Module
 *
 * Minimum requirements for account passwords, checked when a user is
 * created, bootstrapped or changes their password.
 */

use lazy_static::lazy_static;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min_length} characters required")]
    TooShort { min_length: usize },

    #[error("Password too long: maximum {max_length} characters allowed")]
    TooLong { max_length: usize },

    #[error("Password must contain at least one letter")]
    MissingLetter,

    #[error("Password must contain at least one number")]
    MissingNumber,

    #[error("Password is in the list of commonly used passwords")]
    CommonPassword,

    #[error("Password is too similar to the email address")]
    SimilarToEmail,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_letter: bool,
    pub require_number: bool,
    pub prevent_common_passwords: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_letter: true,
            require_number: true,
            prevent_common_passwords: true,
        }
    }
}

lazy_static! {
    static ref COMMON_PASSWORDS: HashSet<&'static str> = [
        "password", "password1", "password123", "12345678", "123456789",
        "1234567890", "qwerty123", "qwertyuiop", "iloveyou1", "welcome1",
        "admin123", "abc12345", "haslo123", "haslo1234", "zaq12wsx",
        "1qaz2wsx", "q1w2e3r4", "polska123", "montaz123",
    ]
    .into_iter()
    .collect();
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str, email: Option<&str>) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if length > self.max_length {
            return Err(PasswordPolicyError::TooLong {
                max_length: self.max_length,
            });
        }
        if self.require_letter && !password.chars().any(char::is_alphabetic) {
            return Err(PasswordPolicyError::MissingLetter);
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingNumber);
        }
        if self.prevent_common_passwords
            && COMMON_PASSWORDS.contains(password.to_lowercase().as_str())
        {
            return Err(PasswordPolicyError::CommonPassword);
        }
        if let Some(local) = email.and_then(|e| e.split('@').next()) {
            if local.len() >= 4 && password.to_lowercase().contains(&local.to_lowercase()) {
                return Err(PasswordPolicyError::SimilarToEmail);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_reasonable_password() {
        assert!(PasswordPolicy::default()
            .validate("Drzwi2025!", Some("jan@example.com"))
            .is_ok());
    }

    #[test]
    fn rejects_weak_passwords() {
        let policy = PasswordPolicy::default();
        assert_matches!(
            policy.validate("abc1", None),
            Err(PasswordPolicyError::TooShort { min_length: 8 })
        );
        assert_matches!(
            policy.validate("onlyletters", None),
            Err(PasswordPolicyError::MissingNumber)
        );
        assert_matches!(
            policy.validate("Haslo123", None),
            Err(PasswordPolicyError::CommonPassword)
        );
        assert_matches!(
            policy.validate("kowalski99", Some("kowalski@firma.pl")),
            Err(PasswordPolicyError::SimilarToEmail)
        );
    }
}
