//! Authentication failure taxonomy.
//!
//! Every variant collapses to the same user-facing message; the tag is only
//! for logs and metrics.

use std::fmt;

/// Message shown on the login page for any failed attempt.
pub const GENERIC_FAILURE: &str = "Incorrect data";

/// Why a single field value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    NotDigit,
    NotFilled,
    IncorrectLength,
    EmailNotValid,
}

impl FieldErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorKind::NotDigit => "NOT_DIGIT",
            FieldErrorKind::NotFilled => "NOT_FILLED",
            FieldErrorKind::IncorrectLength => "INCORRECT_LENGTH",
            FieldErrorKind::EmailNotValid => "EMAIL_NOT_VALID",
        }
    }
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field validator rejected its value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field {field:?} rejected: {kind}")]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub field: String,
}

impl FieldError {
    pub fn new(kind: FieldErrorKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
        }
    }
}

/// Outcome of a failed credential check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing or invalid CSRF token, or a declared field was not submitted.
    #[error("invalid fields: {0}")]
    InvalidFields(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    /// Unknown login or wrong secret. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// What the caller gets to see.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE
    }

    /// Short tag for logs and metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            AuthError::InvalidFields(_) => "invalid_fields",
            AuthError::Field(e) => e.kind.as_str(),
            AuthError::InvalidCredentials => "invalid_credentials",
        }
    }
}
