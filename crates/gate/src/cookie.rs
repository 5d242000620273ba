//! Signed session cookie values

use crate::GateError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies `<id>.<hex mac>` cookie values
#[derive(Clone)]
pub struct CookieSigner {
    keyed: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &[u8]) -> Result<Self, GateError> {
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| GateError::Configuration(format!("invalid signing key: {e}")))?;
        Ok(Self { keyed })
    }

    /// Produce the cookie value for a session id
    #[must_use]
    pub fn sign(&self, session_id: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(session_id.as_bytes());
        let tag = hex::encode(mac.finalize().into_bytes());
        format!("{session_id}.{tag}")
    }

    /// Return the session id if the signature matches
    #[must_use]
    pub fn verify<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (session_id, tag) = value.rsplit_once('.')?;
        if session_id.is_empty() {
            return None;
        }
        let tag = hex::decode(tag).ok()?;
        let mut mac = self.keyed.clone();
        mac.update(session_id.as_bytes());
        mac.verify_slice(&tag).ok()?;
        Some(session_id)
    }
}

/// Find a cookie by name in a `Cookie` request header
#[must_use]
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = CookieSigner::new(b"0123456789abcdef").expect("signer");
        let value = signer.sign("0190-abc");
        assert!(value.starts_with("0190-abc."));
        assert_eq!(signer.verify(&value), Some("0190-abc"));
    }

    #[test]
    fn test_tampered_values_rejected() {
        let signer = CookieSigner::new(b"0123456789abcdef").expect("signer");
        let value = signer.sign("session-1");
        let forged = value.replacen("session-1", "session-2", 1);
        assert_eq!(signer.verify(&forged), None);
        assert_eq!(signer.verify("session-1"), None);
        assert_eq!(signer.verify("session-1.zz"), None);
        assert_eq!(signer.verify(".abcd"), None);
    }

    #[test]
    fn test_other_secret_rejected() {
        let value = CookieSigner::new(b"first secret value").expect("signer").sign("id");
        let other = CookieSigner::new(b"second secret value").expect("signer");
        assert_eq!(other.verify(&value), None);
    }

    #[test]
    fn test_find_cookie() {
        let header = "theme=dark; sluice_session=abc.123 ; other=\"x\"";
        assert_eq!(find_cookie(header, "sluice_session"), Some("abc.123"));
        assert_eq!(find_cookie(header, "other"), Some("x"));
        assert_eq!(find_cookie(header, "missing"), None);
        assert_eq!(find_cookie("", "sluice_session"), None);
    }
}
