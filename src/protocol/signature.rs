//! HMAC-SHA256 signing and verification.
//!
//! The platform secret is used directly as the HMAC key. Comparison goes through
//! [`Mac::verify_slice`], which is constant time over the tag contents and rejects
//! tags of the wrong length without inspecting them.

use crate::error::{constants, Result, VotifierError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes
pub const SIGNATURE_LEN: usize = 32;

/// Check `signature` against HMAC-SHA256(`key`, `message`).
pub fn verify(signature: &[u8], message: &[u8], key: &[u8]) -> bool {
    let mut mac = match <HmacSha256 as Mac>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message);
    mac.verify_slice(signature).is_ok()
}

/// Compute HMAC-SHA256(`key`, `message`).
pub fn sign(message: &[u8], key: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| VotifierError::Custom(format!("Invalid HMAC key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Compute a signature and encode it as standard base64, as sent on the wire.
pub fn sign_base64(message: &[u8], key: &[u8]) -> Result<String> {
    Ok(STANDARD.encode(sign(message, key)?))
}

/// Decode a base64 signature taken from an envelope.
///
/// `service` names the platform in the resulting error.
pub fn decode_signature(encoded: &str, service: &str) -> Result<Vec<u8>> {
    STANDARD.decode(encoded.trim()).map_err(|e| {
        VotifierError::SignatureVerificationFailure(format!(
            "{service} ({}: {e})",
            constants::ERR_SIGNATURE_ENCODING
        ))
    })
}
