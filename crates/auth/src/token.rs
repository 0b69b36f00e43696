//! Bearer-token claim inspection and expiry evaluation.
//!
//! Tokens are treated as opaque credentials issued elsewhere; we only read
//! the embedded claim segment to decide whether the token has lapsed.
//! Signature verification is intentionally outside this crate.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claim set embedded in a bearer token (second dot-separated segment).
///
/// Only the claims the engine consumes are modeled; unknown claims are
/// ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BearerClaims {
    /// Subject / principal identifier.
    #[serde(default)]
    pub sub: Option<String>,

    /// Issued-at, seconds since the epoch.
    #[serde(default)]
    pub iat: Option<i64>,

    /// Expiration, seconds since the epoch. Absent means "does not expire".
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the claim segment of a bearer token.
///
/// Splits on `.`, takes the second segment, reverses URL-safe base64 (any
/// trailing padding is tolerated) and parses the claim JSON. Returns `None`
/// on any malformed input; never panics.
pub fn decode_claims(token: &str) -> Option<BearerClaims> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;
    if payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether a bearer token has lapsed at `now`.
///
/// Undecodable tokens and tokens without an `exp` claim are *not* expired:
/// absence of expiry information must not lock the user out of a token the
/// server might still accept.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    let Some(claims) = decode_claims(token) else {
        return false;
    };
    let Some(exp) = claims.exp else {
        return false;
    };
    exp.saturating_mul(1000) <= now.timestamp_millis()
}
