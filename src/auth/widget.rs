//! The authentication-widget capability and the shared check pipeline.
//!
//! # Responsibilities
//! - Define what a widget provides: name, fields, rendering, verification
//! - Run the common checks every submission goes through (CSRF, field
//!   presence, field validation, login resolution) before the widget's own
//!   credential check
//!
//! # Design Decisions
//! - Widgets are stateless; every call depends only on its inputs
//! - New credential types implement [`AuthWidget`]; [`check_data`] is never
//!   reimplemented per widget
//! - "Unknown login" and "wrong secret" are the same error

use std::collections::HashMap;

use crate::auth::error::AuthError;
use crate::auth::fields::{Field, FieldValues};
use crate::auth::otp::{Clock, TotpSettings};
use crate::config::{User, UserId};
use crate::render::{escape_html, Language};
use crate::session::{csrf, Secret};

/// Name of the hidden CSRF form field.
pub const CSRF_FIELD: &str = "csrf";

/// Field every widget uses to identify the user.
pub const LOGIN_FIELD: &str = "login";

/// Everything a credential check may read.
pub struct AuthContext<'a> {
    pub secret: &'a Secret,
    /// Users authorized on the endpoint being logged into.
    pub users: &'a [&'a User],
    pub clock: &'a dyn Clock,
    pub totp: TotpSettings,
}

impl AuthContext<'_> {
    /// Case-insensitive login lookup among the authorized users.
    pub fn find_user(&self, login: &str) -> Option<&User> {
        self.users
            .iter()
            .copied()
            .find(|user| user.login.eq_ignore_ascii_case(login))
    }
}

/// A pluggable credential check.
pub trait AuthWidget: Send + Sync {
    /// Stable registry name, e.g. `totp`.
    fn name(&self) -> &'static str;

    /// Inputs in declaration order.
    fn fields(&self) -> &[Field];

    /// Widget-specific credential check on already validated values.
    fn verify(&self, values: &FieldValues, user: &User, ctx: &AuthContext<'_>) -> Result<(), AuthError>;

    /// Label key for the "sign in another way" button.
    fn method_label(&self) -> String {
        format!("method.{}", self.name())
    }

    /// Form body: the hidden CSRF token followed by every field.
    fn render(&self, lang: &Language, secret: &Secret) -> String {
        let token = csrf::generate(secret);
        let mut html = format!(
            r#"<input type="hidden" name="{CSRF_FIELD}" value="{}">"#,
            escape_html(&token)
        );
        for field in self.fields() {
            html.push_str(&field.render(lang));
        }
        html
    }
}

/// Validate a submitted form and run the widget's credential check.
///
/// Returns the id of the authenticated user.
pub fn check_data(
    widget: &dyn AuthWidget,
    form: &HashMap<String, String>,
    ctx: &AuthContext<'_>,
) -> Result<UserId, AuthError> {
    // 1. CSRF
    match form.get(CSRF_FIELD) {
        Some(token) if csrf::check(ctx.secret, token) => {}
        Some(_) => return Err(AuthError::InvalidFields("CSRF token is invalid".into())),
        None => return Err(AuthError::InvalidFields("CSRF token is missing".into())),
    }

    // 2 + 3. Presence, then each field's own validator, in declaration order
    let mut values = FieldValues::default();
    for field in widget.fields() {
        let raw = field
            .lookup(form)
            .ok_or_else(|| AuthError::InvalidFields(format!("Field {} is missing", field.name)))?;
        values.insert(field.name, field.validate(raw)?);
    }

    // 4. Resolve the user, then the widget's own check
    let user = values
        .text(LOGIN_FIELD)
        .and_then(|login| ctx.find_user(login))
        .ok_or(AuthError::InvalidCredentials)?;
    widget.verify(&values, user, ctx)?;

    Ok(user.id)
}
