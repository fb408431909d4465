use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum pepper length in bytes.
const MIN_PEPPER_LEN: usize = 32;

/// Keyed digests for reset tokens, plus random token generation.
///
/// Reset tokens are stored as hex(HMAC-SHA256(pepper, token)); a leaked
/// `accounts` table does not yield usable links.
pub struct CryptoEngine {
    pepper: Vec<u8>,
}

impl CryptoEngine {
    /// Create a new CryptoEngine from a base64-encoded pepper.
    pub fn new(pepper_b64: &str) -> Result<Self, AuthError> {
        let pepper = base64::engine::general_purpose::STANDARD
            .decode(pepper_b64.trim())
            .map_err(|e| AuthError::Crypto(format!("Invalid TOKEN_PEPPER base64: {e}")))?;

        if pepper.len() < MIN_PEPPER_LEN {
            return Err(AuthError::Crypto(format!(
                "TOKEN_PEPPER must be at least {MIN_PEPPER_LEN} bytes, got {}",
                pepper.len()
            )));
        }

        Ok(Self { pepper })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        <HmacSha256 as Mac>::new_from_slice(&self.pepper)
            .map_err(|e| AuthError::Crypto(format!("HMAC init failed: {e}")))
    }

    /// Hex-encoded HMAC of a token.
    pub fn digest(&self, token: &str) -> Result<String, AuthError> {
        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }

    /// Constant-time check of a token against a stored hex digest.
    pub fn verify(&self, token: &str, stored_digest: &str) -> bool {
        let Some(expected) = hex_decode(stored_digest) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(token.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// `len` random bytes from the thread RNG, hex-encoded.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Byte comparison whose running time does not depend on where inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
