//! Session tokens carried in the `totp_auth` cookie.
//!
//! A token is `base64(identity) "." signature` where the signature is the
//! hex SHA-256 of `identity "." secret`. Any change to either half makes
//! validation fail.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::session::Secret;

fn signature(identity: &str, secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(b".");
    hasher.update(secret.expose().as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two byte strings.
#[must_use]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Issue a signed token for `identity`.
pub fn issue(identity: &str, secret: &Secret) -> String {
    format!(
        "{}.{}",
        STANDARD.encode(identity.as_bytes()),
        signature(identity, secret)
    )
}

/// Recover the identity from a token, or `None` if it was not signed with
/// `secret` or is malformed.
pub fn validate(token: &str, secret: &Secret) -> Option<String> {
    let (encoded, provided) = token.split_once('.')?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let identity = String::from_utf8(decoded).ok()?;

    let expected = signature(&identity, secret);
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Some(identity)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Secret {
        Secret::new("test-secret").unwrap()
    }

    #[test]
    fn issued_token_validates_back() {
        for identity in ["1", "42", "admin", "ünïcode", ""] {
            let token = issue(identity, &secret());
            assert_eq!(validate(&token, &secret()).as_deref(), Some(identity));
        }
    }

    #[test]
    fn token_shape() {
        let token = issue("7", &secret());
        let (encoded, sig) = token.split_once('.').unwrap();
        assert_eq!(encoded, "Nw==");
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn any_signature_mutation_is_rejected() {
        let token = issue("7", &secret());
        let dot = token.find('.').unwrap();
        for i in dot + 1..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(validate(&tampered, &secret()), None, "mutation at {i}");
        }
    }

    #[test]
    fn swapped_identity_is_rejected() {
        let token = issue("7", &secret());
        let sig = token.split_once('.').unwrap().1;
        let forged = format!("{}.{}", STANDARD.encode("8"), sig);
        assert_eq!(validate(&forged, &secret()), None);
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = issue("7", &secret());
        let rotated = Secret::new("rotated").unwrap();
        assert_eq!(validate(&token, &rotated), None);
    }

    #[test]
    fn malformed_tokens_fail_closed() {
        assert_eq!(validate("", &secret()), None);
        assert_eq!(validate("no-dot-here", &secret()), None);
        assert_eq!(validate("!!!notbase64.abcd", &secret()), None);
    }
}
