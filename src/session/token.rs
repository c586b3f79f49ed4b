//! Expiry inspection for JWT access tokens.
//!
//! The payload is read without verifying the signature. It only drives the
//! decision to refresh early; the server still validates every request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Deserialize)]
struct Claims {
    exp: Option<u64>,
}

/// Unix seconds of the `exp` claim, None when the token is not a JWT or has no exp
pub fn expires_at(token: &str) -> Option<u64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    // some issuers keep the padding
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp
}

/// True when the token carries an exp within `leeway` of `now` (or past it).
/// Unknown expiry is never "expiring".
pub fn is_expiring_at(token: &str, leeway: Duration, now: SystemTime) -> bool {
    let Some(exp) = expires_at(token) else {
        return false;
    };
    let now = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    exp <= now.saturating_add(leeway.as_secs())
}

pub fn is_expiring_soon(token: &str, leeway: Duration) -> bool {
    is_expiring_at(token, leeway, SystemTime::now())
}

#[cfg(test)]
pub(crate) fn fake_jwt(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"admin","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn reads_exp_claim() {
        assert_eq!(expires_at(&fake_jwt(NOW)), Some(NOW));
    }

    #[test]
    fn opaque_tokens_have_unknown_expiry() {
        assert_eq!(expires_at("t1"), None);
        assert_eq!(expires_at("a.b"), None);
        assert_eq!(expires_at("a.!!!.c"), None);
        assert!(!is_expiring_at("t1", Duration::from_secs(300), at(NOW)));
    }

    #[test]
    fn expiring_inside_leeway() {
        let token = fake_jwt(NOW + 120);
        assert!(is_expiring_at(&token, Duration::from_secs(300), at(NOW)));
        assert!(!is_expiring_at(&token, Duration::from_secs(60), at(NOW)));
    }

    #[test]
    fn already_expired_is_expiring() {
        let token = fake_jwt(NOW - 10);
        assert!(is_expiring_at(&token, Duration::from_secs(0), at(NOW)));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let token = fake_jwt(NOW);
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1].push_str("==");
        assert_eq!(expires_at(&parts.join(".")), Some(NOW));
    }
}
