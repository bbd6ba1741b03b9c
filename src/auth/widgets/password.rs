//! Login + password widget.

use sha2::{Digest, Sha256};

use crate::auth::error::AuthError;
use crate::auth::fields::{Field, FieldValues};
use crate::auth::widget::{AuthContext, AuthWidget, LOGIN_FIELD};
use crate::config::User;
use crate::session::token::constant_time_eq;

const FIELDS: [Field; 2] = [
    Field::text(LOGIN_FIELD, "login", 64).lowercased(),
    Field::password("password", "password", 64),
];

/// Checks the password against the user's stored SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordWidget;

impl AuthWidget for PasswordWidget {
    fn name(&self) -> &'static str {
        "password"
    }

    fn fields(&self) -> &[Field] {
        &FIELDS
    }

    fn verify(&self, values: &FieldValues, user: &User, _ctx: &AuthContext<'_>) -> Result<(), AuthError> {
        let (Some(expected), Some(password)) = (user.password_sha256.as_deref(), values.text("password")) else {
            return Err(AuthError::InvalidCredentials);
        };
        let actual = Sha256::digest(password.as_bytes());
        if constant_time_eq(&actual, expected) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
