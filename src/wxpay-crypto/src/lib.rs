//! # wxpay-crypto
//!
//! Cryptographic primitives for the WeChat Pay API v3.
//!
//! - **Request signing**: SHA256withRSA (PKCS#1 v1.5) with the merchant private key
//! - **Response verification**: SHA256withRSA against platform certificate keys
//! - **Payload decryption**: AEAD_AES_256_GCM with the merchant API v3 key
//! - **Field decryption**: RSA-OAEP (SHA-1) for sensitive response fields
//!
//! ## Message Formats
//!
//! Requests are signed over:
//!
//! ```text
//! METHOD\nCANONICAL_URL\nTIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! Responses are verified over:
//!
//! ```text
//! TIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! Signatures travel as standard padded base64.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod aead;
mod error;
mod signing;
mod types;

pub use aead::{decrypt_aes_256_gcm, decrypt_to_string, API_V3_KEY_LEN, NONCE_LEN};
pub use error::CryptoError;
pub use signing::{
    decrypt_oaep, load_private_key_pem, load_public_key_pem, public_key_from_spki_der,
    Sha256WithRsaSigner, Sha256WithRsaVerifier, SignatureVerifier, Signer,
};
pub use types::{SignatureAlgorithm, SignatureResult, AEAD_AES_256_GCM, AUTHORIZATION_SCHEME};

/// Re-exported key types so callers need not depend on `rsa` directly.
pub use ::rsa::{RsaPrivateKey, RsaPublicKey};

/// Constant-time byte comparison.
///
/// Used for digest checks (bill files) where the expected value comes from
/// the provider. The length check returns early; length is not secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
