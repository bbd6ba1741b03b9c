//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (endpoints reference existing users and widgets)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that credential material decodes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FileConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::auth::otp::decode_secret;
use crate::auth::WidgetRegistry;
use crate::config::directory::HostPort;
use crate::config::schema::FileConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("secret must not be empty")]
    MissingSecret,

    #[error("duplicate endpoint id {0}")]
    DuplicateEndpoint(u64),

    #[error("duplicate user id {0}")]
    DuplicateUser(u64),

    #[error("duplicate login '{0}'")]
    DuplicateLogin(String),

    #[error("endpoint {endpoint}: invalid {field} address '{value}'")]
    InvalidAddress {
        endpoint: u64,
        field: &'static str,
        value: String,
    },

    #[error("endpoint {endpoint}: unknown user id {user}")]
    UnknownUser { endpoint: u64, user: u64 },

    #[error("endpoint {0}: no widgets enabled")]
    NoWidgets(u64),

    #[error("endpoint {endpoint}: unknown widget '{widget}'")]
    UnknownWidget { endpoint: u64, widget: String },

    #[error("user {0}: totp_secret is not valid base32")]
    InvalidTotpSecret(u64),

    #[error("user {0}: password_sha256 must be 64 hex characters")]
    InvalidPasswordHash(u64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
    },
}

/// Check everything serde cannot.
pub fn validate_config(config: &FileConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.secret.trim().is_empty() {
        errors.push(ValidationError::MissingSecret);
    }

    for (value, name) in [
        (config.timeouts.connect_secs, "timeouts.connect_secs"),
        (config.timeouts.idle_secs, "timeouts.idle_secs"),
        (config.totp.step_secs, "totp.step_secs"),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }
    if config.limits.max_connections == 0 {
        errors.push(ValidationError::Zero("limits.max_connections"));
    }
    if config.limits.max_head_bytes == 0 {
        errors.push(ValidationError::Zero("limits.max_head_bytes"));
    }
    if !(1..=9).contains(&config.totp.digits) {
        errors.push(ValidationError::OutOfRange {
            field: "totp.digits",
            min: 1,
            max: 9,
        });
    }

    let mut user_ids = HashSet::new();
    let mut logins = HashSet::new();
    for user in &config.users {
        if !user_ids.insert(user.id) {
            errors.push(ValidationError::DuplicateUser(user.id));
        }
        if !logins.insert(user.login.to_lowercase()) {
            errors.push(ValidationError::DuplicateLogin(user.login.clone()));
        }
        if let Some(secret) = &user.totp_secret {
            if decode_secret(secret).is_err() {
                errors.push(ValidationError::InvalidTotpSecret(user.id));
            }
        }
        if let Some(hash) = &user.password_sha256 {
            if !matches!(hex::decode(hash), Ok(bytes) if bytes.len() == 32) {
                errors.push(ValidationError::InvalidPasswordHash(user.id));
            }
        }
    }

    let registry = WidgetRegistry::builtin(&config.totp);
    let mut endpoint_ids = HashSet::new();
    for endpoint in &config.endpoints {
        if !endpoint_ids.insert(endpoint.id) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.id));
        }

        for (field, value) in [("listen", &endpoint.listen), ("upstream", &endpoint.upstream)] {
            if HostPort::parse(value).is_none() {
                errors.push(ValidationError::InvalidAddress {
                    endpoint: endpoint.id,
                    field,
                    value: value.clone(),
                });
            }
        }

        for user in &endpoint.users {
            if !user_ids.contains(user) {
                errors.push(ValidationError::UnknownUser {
                    endpoint: endpoint.id,
                    user: *user,
                });
            }
        }

        if endpoint.widgets.is_empty() {
            errors.push(ValidationError::NoWidgets(endpoint.id));
        }
        for widget in &endpoint.widgets {
            if !registry.contains(widget) {
                errors.push(ValidationError::UnknownWidget {
                    endpoint: endpoint.id,
                    widget: widget.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
