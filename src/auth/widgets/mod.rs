//! Built-in widgets.

pub mod password;
pub mod totp;

pub use password::PasswordWidget;
pub use totp::TotpWidget;
