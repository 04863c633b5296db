//! # Validation Module
//!
//! Input checks applied before a project or secret is written.
//!
//! ## Usage
//! ```rust
//! use warden_core::validation::{validate_project_name, validate_secret_key};
//!
//! assert!(validate_project_name("payments-api").is_ok());
//! assert!(validate_secret_key("").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{NewProject, NewSecret, Project, Secret};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_PROJECT_NAME_LEN: usize = 500;
pub const MAX_SECRET_KEY_LEN: usize = 500;
pub const MAX_SECRET_VALUE_LEN: usize = 35_000;
pub const MAX_SECRET_NOTE_LEN: usize = 10_000;

// =============================================================================
// Field Validators
// =============================================================================

fn require(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    check_len(field, value, max)
}

fn check_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a project name.
///
/// ## Rules
/// - Must not be blank
/// - At most 500 characters
pub fn validate_project_name(name: &str) -> ValidationResult<()> {
    require("name", name, MAX_PROJECT_NAME_LEN)
}

/// Validates a secret key.
///
/// ## Rules
/// - Must not be blank
/// - At most 500 characters
/// - No control characters (keys end up in env files and shell exports)
pub fn validate_secret_key(key: &str) -> ValidationResult<()> {
    require("key", key, MAX_SECRET_KEY_LEN)?;

    if key.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "key".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a secret value. Empty values are allowed.
pub fn validate_secret_value(value: &str) -> ValidationResult<()> {
    check_len("value", value, MAX_SECRET_VALUE_LEN)
}

/// Validates an optional secret note.
pub fn validate_secret_note(note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(note) => check_len("note", note, MAX_SECRET_NOTE_LEN),
        None => Ok(()),
    }
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a project creation request.
pub fn validate_new_project(project: &NewProject) -> ValidationResult<()> {
    validate_project_name(&project.name)
}

/// Validates a project before it is updated.
pub fn validate_project(project: &Project) -> ValidationResult<()> {
    validate_project_name(&project.name)
}

/// Validates a secret creation request.
pub fn validate_new_secret(secret: &NewSecret) -> ValidationResult<()> {
    validate_secret_key(&secret.key)?;
    validate_secret_value(&secret.value)?;
    validate_secret_note(secret.note.as_deref())
}

/// Validates a secret before it is updated.
pub fn validate_secret(secret: &Secret) -> ValidationResult<()> {
    validate_secret_key(&secret.key)?;
    validate_secret_value(&secret.value)?;
    validate_secret_note(secret.note.as_deref())
}

// =============================================================================
// Unit Tests
// =============================================================================
