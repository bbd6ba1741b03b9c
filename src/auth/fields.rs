//! Form input fields and their validators.
//!
//! # Responsibilities
//! - Declare the inputs a widget needs (name, label key, rule)
//! - Validate one raw string value into a typed [`FieldValue`]
//! - Render the HTML fragment for the input
//!
//! # Design Decisions
//! - Validators return tagged [`FieldError`]s; they never decide the
//!   user-facing message
//! - A field may accept legacy form names as aliases

use std::collections::HashMap;

use crate::auth::error::{FieldError, FieldErrorKind};
use crate::render::{escape_html, Language};

/// Upper bound on an e-mail address.
const MAX_EMAIL_LENGTH: usize = 320;

/// Validation rule attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, at most `max_length` characters.
    Text { max_length: usize, lowercase: bool },
    /// Masked input, at most `max_length` characters.
    Password { max_length: usize },
    /// Exactly `digits` ASCII digits.
    Numeric { digits: usize },
    /// `local@domain.tld`, lowercase alphanumerics.
    Email,
}

/// Validated value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Digits are kept as a string so leading zeros survive.
    Digits(String),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Text(s) | FieldValue::Digits(s) => s,
        }
    }
}

/// One declared widget input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
}

impl Field {
    pub const fn text(name: &'static str, label: &'static str, max_length: usize) -> Self {
        Self {
            name,
            label,
            aliases: &[],
            kind: FieldKind::Text {
                max_length,
                lowercase: false,
            },
        }
    }

    pub const fn password(name: &'static str, label: &'static str, max_length: usize) -> Self {
        Self {
            name,
            label,
            aliases: &[],
            kind: FieldKind::Password { max_length },
        }
    }

    pub const fn numeric(name: &'static str, label: &'static str, digits: usize) -> Self {
        Self {
            name,
            label,
            aliases: &[],
            kind: FieldKind::Numeric { digits },
        }
    }

    pub const fn email(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            aliases: &[],
            kind: FieldKind::Email,
        }
    }

    /// Lower-case text input before it is returned.
    pub const fn lowercased(mut self) -> Self {
        if let FieldKind::Text { max_length, .. } = self.kind {
            self.kind = FieldKind::Text {
                max_length,
                lowercase: true,
            };
        }
        self
    }

    pub const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// The submitted value for this field, by name or by alias.
    pub fn lookup<'a>(&self, form: &'a HashMap<String, String>) -> Option<&'a str> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .find_map(|name| form.get(*name))
            .map(String::as_str)
    }

    /// Check a raw value against this field's rule.
    pub fn validate(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let reject = |kind| Err(FieldError::new(kind, self.name));
        match self.kind {
            FieldKind::Text {
                max_length,
                lowercase,
            } => {
                if raw.chars().count() > max_length {
                    return reject(FieldErrorKind::IncorrectLength);
                }
                let value = if lowercase {
                    raw.to_lowercase()
                } else {
                    raw.to_string()
                };
                Ok(FieldValue::Text(value))
            }
            FieldKind::Password { max_length } => {
                if raw.chars().count() > max_length {
                    return reject(FieldErrorKind::IncorrectLength);
                }
                Ok(FieldValue::Text(raw.to_string()))
            }
            FieldKind::Numeric { digits } => {
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return reject(FieldErrorKind::NotDigit);
                }
                if raw.len() != digits {
                    return reject(FieldErrorKind::IncorrectLength);
                }
                Ok(FieldValue::Digits(raw.to_string()))
            }
            FieldKind::Email => {
                if raw.is_empty() {
                    return reject(FieldErrorKind::NotFilled);
                }
                if raw.len() > MAX_EMAIL_LENGTH {
                    return reject(FieldErrorKind::IncorrectLength);
                }
                if !is_plain_email(raw) {
                    return reject(FieldErrorKind::EmailNotValid);
                }
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
    }

    /// HTML fragment for this input.
    pub fn render(&self, lang: &Language) -> String {
        let name = escape_html(self.name);
        let label = escape_html(lang.label(self.label));
        match self.kind {
            FieldKind::Text { max_length, .. } => format!(
                r#"<div class="input-field input-field-text"><label for="{name}">{label}</label><input type="text" id="{name}" name="{name}" maxlength="{max_length}" required></div>"#
            ),
            FieldKind::Password { max_length } => format!(
                r#"<div class="input-field input-field-password"><label for="{name}">{label}</label><input type="password" id="{name}" name="{name}" maxlength="{max_length}" required></div>"#
            ),
            FieldKind::Numeric { digits } => {
                let boxes: String = (0..digits)
                    .map(|i| {
                        format!(
                            r#"<input type="number" data-custom-type="numeric-digit" name="{name}-{i}" id="{name}-{i}" min="0" max="9" required>"#
                        )
                    })
                    .collect();
                format!(
                    r#"<div class="input-field input-field-numeric"><label for="{name}">{label}</label><input type="hidden" name="{name}" data-custom-type="numeric"><div class="input-field-numeric-digits">{boxes}</div></div>"#
                )
            }
            FieldKind::Email => format!(
                r#"<div class="input-field input-field-email"><label for="{name}">{label}</label><input type="email" id="{name}" name="{name}" maxlength="{MAX_EMAIL_LENGTH}" required></div>"#
            ),
        }
    }
}

fn is_plain_email(value: &str) -> bool {
    let alnum = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.split_once('.') else {
        return false;
    };
    alnum(local) && alnum(host) && !tld.is_empty() && tld.bytes().all(|b| b.is_ascii_lowercase())
}

/// Validated values keyed by declared field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(HashMap<&'static str, FieldValue>);

impl FieldValues {
    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).map(FieldValue::as_str)
    }
}
