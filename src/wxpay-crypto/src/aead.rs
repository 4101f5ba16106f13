//! AEAD_AES_256_GCM decryption of provider-encrypted payloads.
//!
//! The provider encrypts notification resources and platform certificates
//! with the merchant's 32-byte API v3 key. The ciphertext is base64 of the
//! encrypted bytes followed by the 16-byte authentication tag.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CryptoError;

/// Required API v3 key length in bytes.
pub const API_V3_KEY_LEN: usize = 32;

/// Required GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Decrypt an AES-256-GCM payload.
///
/// `nonce` and `associated_data` are used as their raw UTF-8 bytes; an empty
/// `associated_data` is valid.
///
/// # Errors
///
/// Fails on a key that is not 32 bytes, a nonce that is not 12 bytes,
/// malformed base64, or an authentication tag mismatch.
pub fn decrypt_aes_256_gcm(
    api_v3_key: &[u8],
    associated_data: &str,
    nonce: &str,
    ciphertext_b64: &str,
) -> Result<Vec<u8>, CryptoError> {
    if api_v3_key.len() != API_V3_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: API_V3_KEY_LEN,
            actual: api_v3_key.len(),
        });
    }
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonceLength {
            expected: NONCE_LEN,
            actual: nonce.len(),
        });
    }

    let ciphertext = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| CryptoError::invalid_base64("ciphertext", e))?;

    let cipher = Aes256Gcm::new_from_slice(api_v3_key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: API_V3_KEY_LEN,
        actual: api_v3_key.len(),
    })?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: &ciphertext,
                aad: associated_data.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::decryption_failed("authentication tag mismatch"))
}

/// Decrypt an AES-256-GCM payload and interpret it as UTF-8 text.
///
/// # Errors
///
/// Same as [`decrypt_aes_256_gcm`], plus non-UTF-8 plaintext.
pub fn decrypt_to_string(
    api_v3_key: &[u8],
    associated_data: &str,
    nonce: &str,
    ciphertext_b64: &str,
) -> Result<String, CryptoError> {
    let plaintext = decrypt_aes_256_gcm(api_v3_key, associated_data, nonce, ciphertext_b64)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::decryption_failed(e.to_string()))
}
