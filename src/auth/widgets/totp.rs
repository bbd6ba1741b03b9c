//! Login + authenticator code widget.

use crate::auth::error::AuthError;
use crate::auth::fields::{Field, FieldValues};
use crate::auth::otp::Totp;
use crate::auth::widget::{AuthContext, AuthWidget, LOGIN_FIELD};
use crate::config::User;

/// Checks a time-based one-time code against the user's TOTP secret.
///
/// Also accepts the `username`/`totp` form names used by older login pages.
#[derive(Debug, Clone)]
pub struct TotpWidget {
    fields: [Field; 2],
}

impl TotpWidget {
    pub fn new(digits: u32) -> Self {
        Self {
            fields: [
                Field::text(LOGIN_FIELD, "login", 64)
                    .lowercased()
                    .with_aliases(&["username"]),
                Field::numeric("code", "code", digits as usize).with_aliases(&["totp"]),
            ],
        }
    }
}

impl Default for TotpWidget {
    fn default() -> Self {
        Self::new(6)
    }
}

impl AuthWidget for TotpWidget {
    fn name(&self) -> &'static str {
        "totp"
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn verify(&self, values: &FieldValues, user: &User, ctx: &AuthContext<'_>) -> Result<(), AuthError> {
        let (Some(key), Some(code)) = (user.totp_key.as_deref(), values.text("code")) else {
            return Err(AuthError::InvalidCredentials);
        };
        let totp = Totp::new(key, ctx.totp).map_err(|e| {
            tracing::warn!(user_id = user.id, error = %e, "Unusable TOTP key");
            AuthError::InvalidCredentials
        })?;
        if totp.verify(code, ctx.clock.unix_time()) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
