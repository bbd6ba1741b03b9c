//! Display strings for the login page.

use std::collections::HashMap;

/// Label lookup keyed by dotted names such as `login` or `method.totp`.
///
/// Unknown keys render as the key itself so a missing translation is
/// visible rather than fatal.
#[derive(Debug, Clone, Default)]
pub struct Language {
    labels: HashMap<String, String>,
}

impl Language {
    pub fn english() -> Self {
        let mut lang = Self::default();
        for (key, value) in [
            ("login", "Login"),
            ("password", "Password"),
            ("code", "One-time code"),
            ("email", "E-mail"),
            ("submit", "Sign in"),
            ("other_methods", "Other ways to sign in"),
            ("method.password", "Use a password"),
            ("method.totp", "Use an authenticator code"),
        ] {
            lang.set(key, value);
        }
        lang
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.insert(key.into(), value.into());
    }

    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.labels.get(key).map(String::as_str).unwrap_or(key)
    }
}
