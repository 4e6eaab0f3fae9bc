// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate a SQL identifier: ASCII alphanumerics and `_`, not starting with a digit
    pub fn is_identifier(value: &str, field: &str) -> Result<()> {
        let mut chars = value.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid identifier, got '{}'",
                field, value
            )));
        }
        Ok(())
    }

    /// Validate that two optional values are either both set or both unset
    pub fn paired<A, B>(a: &Option<A>, a_field: &str, b: &Option<B>, b_field: &str) -> Result<()> {
        match (a.is_some(), b.is_some()) {
            (true, false) => Err(ConfigError::ValidationError(format!(
                "{} is set but {} is missing",
                a_field, b_field
            ))),
            (false, true) => Err(ConfigError::ValidationError(format!(
                "{} is set but {} is missing",
                b_field, a_field
            ))),
            _ => Ok(()),
        }
    }
}
