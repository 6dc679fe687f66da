//! Local password policy.
//!
//! Checked before any backend call so a rejected password never reaches the
//! authentication provider.

use thiserror::Error;

/// Why a password was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no password entered")]
    Empty,

    #[error("password shorter than {min} characters")]
    TooShort { min: usize },

    #[error("password longer than {max} characters")]
    TooLong { max: usize },

    #[error("password must contain a letter and a digit")]
    NotComplex,
}

impl ValidationError {
    /// Message key describing the rejection to the user.
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::Empty => "gui.password-placeholder",
            ValidationError::TooShort { .. } => "gui.password-too-short",
            ValidationError::TooLong { .. } => "gui.password-too-long",
            ValidationError::NotComplex => "gui.password-complexity-failed",
        }
    }

    /// Placeholder values for the message template.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            ValidationError::TooShort { min } => vec![("min", min.to_string())],
            ValidationError::TooLong { max } => vec![("max", max.to_string())],
            ValidationError::Empty | ValidationError::NotComplex => Vec::new(),
        }
    }
}

/// Length and complexity limits for new and entered passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    /// Require at least one ASCII letter and one ASCII digit.
    pub require_complexity: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            max_length: 20,
            require_complexity: false,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password. Lengths count characters, not bytes.
    pub fn check(&self, password: &str) -> Result<(), ValidationError> {
        if password.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = password.chars().count();
        if len < self.min_length {
            return Err(ValidationError::TooShort {
                min: self.min_length,
            });
        }
        if len > self.max_length {
            return Err(ValidationError::TooLong {
                max: self.max_length,
            });
        }

        if self.require_complexity {
            let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
            let has_digit = password.chars().any(|c| c.is_ascii_digit());
            if !(has_letter && has_digit) {
                return Err(ValidationError::NotComplex);
            }
        }

        Ok(())
    }
}
