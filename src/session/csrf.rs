//! CSRF tokens embedded in every login form.
//!
//! A token is `base64(timestamp ":" sha256hex(timestamp ":" secret))`. The
//! timestamp is carried but no expiry window is enforced; validity is the
//! signature alone.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::session::token::constant_time_eq;
use crate::session::Secret;

fn signature(timestamp: &str, secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(b":");
    hasher.update(secret.expose().as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a token stamped with the current time.
pub fn generate(secret: &Secret) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    generate_at(secret, &now.to_string())
}

/// Generate a token for an explicit timestamp string.
pub fn generate_at(secret: &Secret, timestamp: &str) -> String {
    let hashed = signature(timestamp, secret);
    STANDARD.encode(format!("{timestamp}:{hashed}"))
}

/// Whether `token` was generated with `secret`. Never panics; any decode or
/// format problem is `false`.
pub fn check(secret: &Secret, token: &str) -> bool {
    let Ok(decoded) = STANDARD.decode(token) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((timestamp, hashed)) = decoded.split_once(':') else {
        return false;
    };
    constant_time_eq(signature(timestamp, secret).as_bytes(), hashed.as_bytes())
}
