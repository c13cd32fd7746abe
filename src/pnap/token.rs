//! Bearer-token introspection.
//!
//! The driver never verifies token signatures; the remote service is the
//! signature authority. This module only performs a local expiry pre-check by
//! structurally decoding the claims segment, so an expired token falls
//! through to the next credential tier instead of failing a remote call.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<ExpClaim>,
}

/// The `exp` claim arrives either as a numeric timestamp or as a
/// decimal-string encoding of one.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpClaim {
    Seconds(i64),
    Text(String),
}

/// Extracts the expiry instant from a compact-form token without verifying
/// its signature.
///
/// Returns `None` for malformed tokens and for tokens without a usable `exp`
/// claim; decode problems are never surfaced as errors.
pub(crate) fn expiry(token: &str) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    let payload = segments.get(1)?;

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    let seconds = match claims.exp? {
        ExpClaim::Seconds(seconds) => seconds,
        ExpClaim::Text(text) => text.parse().ok()?,
    };
    DateTime::from_timestamp(seconds, 0)
}

/// Returns `true` when the token decodes and its `exp` claim lies in the
/// future.
pub(crate) fn is_live(token: &str, now: DateTime<Utc>) -> bool {
    expiry(token).is_some_and(|exp| exp > now)
}
