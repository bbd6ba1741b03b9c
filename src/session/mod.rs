//! Signed tokens derived from the process-wide secret.
//!
//! # Data Flow
//! ```text
//! Secret (from config)
//!     → token.rs  issue(user id)  → base64(id) "." sha256hex(id "." secret)  → totp_auth cookie
//!     → token.rs  validate(cookie) → user id | None
//!     → csrf.rs   generate()      → base64(ts ":" sha256hex(ts ":" secret)) → hidden form field
//!     → csrf.rs   check(token)    → bool
//! ```
//!
//! # Design Decisions
//! - Pure functions over a caller-supplied [`Secret`]; nothing is stored
//! - Tokens never expire; rotating the secret revokes all of them
//! - Signatures are compared in constant time

pub mod csrf;
pub mod secret;
pub mod token;

pub use secret::Secret;
