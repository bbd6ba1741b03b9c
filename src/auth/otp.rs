//! Time-based one-time passwords (RFC 6238).
//!
//! HMAC-SHA1 over the big-endian time-step counter, dynamic truncation,
//! `digits` decimal digits. Secrets are base32 as issued by authenticator
//! apps.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::session::token::constant_time_eq;

type HmacSha1 = Hmac<Sha1>;

/// Source of the current time for code verification.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn unix_time(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_time(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("TOTP secret is not valid base32")]
    InvalidSecret,

    #[error("TOTP key rejected: {0}")]
    InvalidKey(String),
}

/// Decode a base32 secret. Spaces, case and trailing padding are ignored.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, OtpError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let normalized = normalized.trim_end_matches('=');
    if normalized.is_empty() {
        return Err(OtpError::InvalidSecret);
    }
    data_encoding::BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|_| OtpError::InvalidSecret)
}

/// Code generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TotpSettings {
    /// Length of one time step in seconds.
    pub step_secs: u64,
    /// Number of decimal digits in a code.
    pub digits: u32,
    /// Adjacent steps accepted on either side, for clock drift.
    pub skew_steps: u64,
}

impl Default for TotpSettings {
    fn default() -> Self {
        Self {
            step_secs: 30,
            digits: 6,
            skew_steps: 1,
        }
    }
}

/// A TOTP generator bound to one key.
#[derive(Clone)]
pub struct Totp {
    mac: HmacSha1,
    settings: TotpSettings,
}

impl Totp {
    pub fn new(key: &[u8], settings: TotpSettings) -> Result<Self, OtpError> {
        let mac = <HmacSha1 as Mac>::new_from_slice(key)
            .map_err(|e| OtpError::InvalidKey(e.to_string()))?;
        Ok(Self { mac, settings })
    }

    fn counter(&self, unix_time: u64) -> u64 {
        unix_time / self.settings.step_secs.max(1)
    }

    fn code_for_counter(&self, counter: u64) -> String {
        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let modulus = 10u32.pow(self.settings.digits);
        format!(
            "{:0width$}",
            binary % modulus,
            width = self.settings.digits as usize
        )
    }

    /// The code valid at `unix_time`.
    pub fn code_at(&self, unix_time: u64) -> String {
        self.code_for_counter(self.counter(unix_time))
    }

    /// Whether `code` matches the step at `unix_time` or one within the
    /// configured skew.
    pub fn verify(&self, code: &str, unix_time: u64) -> bool {
        let current = self.counter(unix_time);
        let skew = self.settings.skew_steps;
        let mut matched = false;
        for counter in current.saturating_sub(skew)..=current.saturating_add(skew) {
            matched |= constant_time_eq(self.code_for_counter(counter).as_bytes(), code.as_bytes());
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "JBSWY3DPEHPK3PXP";
    const INSTANT: u64 = 1_508_613_180;

    fn totp(skew_steps: u64) -> Totp {
        Totp::new(
            &decode_secret(SECRET).unwrap(),
            TotpSettings {
                skew_steps,
                ..TotpSettings::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn rfc6238_sha1_vector() {
        let totp = Totp::new(b"12345678901234567890", TotpSettings::default()).unwrap();
        assert_eq!(totp.code_at(59), "287082");

        let eight = Totp::new(
            b"12345678901234567890",
            TotpSettings {
                digits: 8,
                ..TotpSettings::default()
            },
        )
        .unwrap();
        assert_eq!(eight.code_at(59), "94287082");
    }

    #[test]
    fn known_code_for_fixture_secret() {
        assert_eq!(totp(0).code_at(INSTANT), "123456");
        assert_eq!(totp(0).code_at(INSTANT - 30), "161911");
        assert_eq!(totp(0).code_at(INSTANT + 30), "166752");
    }

    #[test]
    fn verify_without_skew_is_exact() {
        let totp = totp(0);
        assert!(totp.verify("123456", INSTANT));
        assert!(totp.verify("123456", INSTANT + 29));
        assert!(!totp.verify("161911", INSTANT));
        assert!(!totp.verify("654321", INSTANT));
    }

    #[test]
    fn verify_accepts_adjacent_steps_with_skew() {
        let totp = totp(1);
        assert!(totp.verify("161911", INSTANT));
        assert!(totp.verify("166752", INSTANT));
        assert!(!totp.verify("123456", INSTANT + 90));
    }

    #[test]
    fn decode_secret_normalizes_input() {
        let canonical = decode_secret(SECRET).unwrap();
        assert_eq!(decode_secret("jbsw y3dp ehpk 3pxp").unwrap(), canonical);
        assert_eq!(canonical, b"Hello!\xde\xad\xbe\xef");
    }

    #[test]
    fn decode_secret_rejects_garbage() {
        assert!(decode_secret("").is_err());
        assert!(decode_secret("not base32!").is_err());
    }

    #[test]
    fn fixed_clock_reports_its_instant() {
        assert_eq!(FixedClock(INSTANT).unix_time(), INSTANT);
    }
}
