//! Bearer token claim decoding. Tokens are three dot-separated segments where the
//! middle one is base64 JSON; only the claims are read, the signature is never
//! checked. Expiry checks fail safe: a token that cannot be decoded is treated as
//! already expiring.

mod error;

pub use error::DecodeError;

use base64ct::{Base64, Base64Unpadded, Base64Url, Base64UrlUnpadded, Encoding};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lead time before expiry at which a token counts as expiring.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(3 * 60);

/// Claims read from a token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Expiration as milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
    pub subject: Option<String>,
}

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

// JWTs use base64url without padding; standard base64 and padded forms are accepted too.
fn decode_segment(segment: &str) -> Result<Vec<u8>, DecodeError> {
    Base64UrlUnpadded::decode_vec(segment)
        .or_else(|_| Base64Url::decode_vec(segment))
        .or_else(|_| Base64::decode_vec(segment))
        .or_else(|_| Base64Unpadded::decode_vec(segment))
        .map_err(|_| DecodeError::Base64)
}

/// Decode the claims segment of a token.
///
/// # Errors
///
/// Returns an error if the token is not three dot-separated segments, the claims
/// segment is not valid base64 JSON, or `exp` is missing or not a number.
pub fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let mut parts = token.trim().split('.');
    let _header = parts.next().ok_or(DecodeError::Format)?;
    let claims_b64 = parts.next().ok_or(DecodeError::Format)?;
    let _signature = parts.next().ok_or(DecodeError::Format)?;
    if parts.next().is_some() || claims_b64.is_empty() {
        return Err(DecodeError::Format);
    }

    let payload: Value = serde_json::from_slice(&decode_segment(claims_b64)?)?;

    let exp = payload
        .get("exp")
        .and_then(Value::as_f64)
        .filter(|exp| exp.is_finite())
        .ok_or(DecodeError::MissingExp)?;

    #[allow(clippy::cast_possible_truncation)]
    let expires_at_ms = (exp * 1000.0) as i64;

    Ok(Claims {
        expires_at_ms,
        subject: payload
            .get("sub")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    })
}

/// Expiration instant of a token in milliseconds since the Unix epoch.
///
/// # Errors
///
/// Returns an error if the token cannot be decoded.
pub fn expires_at_ms(token: &str) -> Result<i64, DecodeError> {
    decode_claims(token).map(|claims| claims.expires_at_ms)
}

/// Milliseconds left before the refresh should happen, `exp - now - threshold`.
/// Zero or negative means the token is already inside the threshold.
///
/// # Errors
///
/// Returns an error if the token cannot be decoded.
pub fn refresh_delay_ms(token: &str, threshold: Duration, now_ms: i64) -> Result<i64, DecodeError> {
    let expires_at = expires_at_ms(token)?;
    Ok(expires_at
        .saturating_sub(now_ms)
        .saturating_sub(threshold_ms(threshold)))
}

/// True when the token expires within `threshold` of `now_ms`, or cannot be decoded.
#[must_use]
pub fn is_expiring_soon(token: &str, threshold: Duration, now_ms: i64) -> bool {
    match expires_at_ms(token) {
        Ok(expires_at) => expires_at.saturating_sub(now_ms) <= threshold_ms(threshold),
        Err(_) => true,
    }
}

/// [`is_expiring_soon`] against the system clock and the default threshold.
#[must_use]
pub fn is_expiring_soon_now(token: &str) -> bool {
    is_expiring_soon(token, DEFAULT_REFRESH_THRESHOLD, SystemClock.now_ms())
}

pub(crate) fn threshold_ms(threshold: Duration) -> i64 {
    i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX)
}
