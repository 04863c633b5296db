//! # Error Types
//!
//! Domain-specific error types for warden-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  warden-core errors (this file)                                        │
//! │  ├── CoreError        - Programmer errors and rule violations          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  warden-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value outside a closed set was supplied.
    ///
    /// ## When This Occurs
    /// - Converting an unknown access-client code (e.g. `99`)
    /// - Parsing an unknown access-client name
    ///
    /// This is a caller bug. It is never retried and never mapped to a
    /// permissive or restrictive default.
    #[error("Invalid argument {argument}: {value}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },

    /// A write would link records owned by two different organizations.
    ///
    /// ## When This Occurs
    /// - Granting a project to another organization's user, group or
    ///   service account
    /// - Adding an organization user to another organization's group
    /// - Attaching a secret to another organization's project
    #[error("{entity} {id} belongs to a different organization")]
    CrossOrganization { entity: &'static str, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidArgument error.
    pub fn invalid_argument(argument: &'static str, value: impl ToString) -> Self {
        CoreError::InvalidArgument {
            argument,
            value: value.to_string(),
        }
    }

    /// Creates a CrossOrganization error.
    pub fn cross_organization(entity: &'static str, id: impl ToString) -> Self {
        CoreError::CrossOrganization {
            entity,
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
