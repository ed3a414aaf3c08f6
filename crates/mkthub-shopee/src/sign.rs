//! HMAC-SHA256 request signing and push verification.
//!
//! Shop-level calls sign `partner_id + path + timestamp + access_token +
//! shop_id`; public calls sign `partner_id + path + timestamp`. Push
//! notifications carry the hex HMAC of `<callback url>|<raw body>` in the
//! `Authorization` header. All signatures are lowercase hex keyed with the
//! partner key.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ShopeeError;

type HmacSha256 = Hmac<Sha256>;

fn hex_hmac(partner_key: &str, parts: &[&[u8]]) -> Result<String, ShopeeError> {
    let mut mac = HmacSha256::new_from_slice(partner_key.as_bytes())
        .map_err(|e| ShopeeError::Signing(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Signature for shop-level API calls.
///
/// # Errors
///
/// Returns [`ShopeeError::Signing`] if the HMAC cannot be keyed.
pub fn sign_shop_call(
    partner_key: &str,
    partner_id: i64,
    path: &str,
    timestamp: i64,
    access_token: &str,
    shop_id: i64,
) -> Result<String, ShopeeError> {
    let base = format!("{partner_id}{path}{timestamp}{access_token}{shop_id}");
    hex_hmac(partner_key, &[base.as_bytes()])
}

/// Signature for public calls (token exchange and refresh).
///
/// # Errors
///
/// Returns [`ShopeeError::Signing`] if the HMAC cannot be keyed.
pub fn sign_public_call(
    partner_key: &str,
    partner_id: i64,
    path: &str,
    timestamp: i64,
) -> Result<String, ShopeeError> {
    let base = format!("{partner_id}{path}{timestamp}");
    hex_hmac(partner_key, &[base.as_bytes()])
}

/// Checks a push notification's `Authorization` header in constant time.
#[must_use]
pub fn verify_push(partner_key: &str, callback_url: &str, body: &[u8], authorization: &str) -> bool {
    let Ok(expected) = hex_hmac(partner_key, &[callback_url.as_bytes(), b"|", body]) else {
        return false;
    };
    let provided = authorization.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
