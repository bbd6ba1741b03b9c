//! Authentication-widget subsystem.
//!
//! # Data Flow
//! ```text
//! POST form fields
//!     → registry.rs (pick the widget the endpoint enables)
//!     → widget.rs check_data:
//!         csrf field      → session::csrf::check      → InvalidFields
//!         declared fields → fields.rs validate         → FieldError{kind, field}
//!         login           → authorized users of endpoint → InvalidCredentials
//!         widget.verify   → widgets/{password,totp}.rs → InvalidCredentials
//!     → Ok(user id) | Err(AuthError)  (one generic message to the client)
//! ```
//!
//! # Design Decisions
//! - Widgets are a fixed, explicitly registered set implementing one trait
//! - Validation failures are values, not panics; the dispatcher inspects
//!   the tag only for logging

pub mod error;
pub mod fields;
pub mod otp;
pub mod registry;
pub mod widget;
pub mod widgets;

pub use error::{AuthError, FieldError, FieldErrorKind, GENERIC_FAILURE};
pub use fields::{Field, FieldKind, FieldValue, FieldValues};
pub use otp::{Clock, FixedClock, SystemClock, Totp, TotpSettings};
pub use registry::WidgetRegistry;
pub use widget::{check_data, AuthContext, AuthWidget};
