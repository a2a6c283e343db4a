//! Webhook request signing (HMAC-SHA256, base64).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, WatchError};

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn hmac_base64(key: &[u8], message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| WatchError::notify("sign", e.to_string()))?;
    mac.update(message);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// DingTalk: key is the secret, message is `"{timestamp_ms}\n{secret}"`.
pub(crate) fn dingtalk_sign(secret: &str, timestamp_ms: i64) -> Result<String> {
    hmac_base64(
        secret.as_bytes(),
        format!("{timestamp_ms}\n{secret}").as_bytes(),
    )
}

/// Lark: key is `"{timestamp_s}\n{secret}"`, message is empty.
pub(crate) fn lark_sign(secret: &str, timestamp_s: i64) -> Result<String> {
    hmac_base64(format!("{timestamp_s}\n{secret}").as_bytes(), b"")
}
