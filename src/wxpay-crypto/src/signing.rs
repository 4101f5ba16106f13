//! SHA256withRSA signing and verification, plus RSA-OAEP field decryption.
//!
//! Outgoing requests are signed with the merchant private key; responses are
//! verified against platform certificate public keys. Both use PKCS#1 v1.5
//! padding over a SHA-256 digest.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::types::{SignatureAlgorithm, SignatureResult};

/// Produces signatures over canonical request messages.
pub trait Signer: Send + Sync {
    /// Algorithm used by this signer.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Serial number of the certificate that matches the signing key.
    fn serial_number(&self) -> &str;

    /// Sign a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the signer is misconfigured or signing fails.
    fn sign(&self, message: &str) -> Result<SignatureResult, CryptoError>;
}

/// Checks a raw signature against a public key.
pub trait SignatureVerifier: Send + Sync {
    /// Algorithm checked by this verifier.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Verify `signature` over `message`.
    ///
    /// Returns `Ok(false)` for a well-formed but non-matching signature.
    fn verify(
        &self,
        public_key: &RsaPublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError>;
}

/// Merchant request signer (SHA256withRSA).
pub struct Sha256WithRsaSigner {
    serial_number: String,
    private_key: RsaPrivateKey,
}

impl Sha256WithRsaSigner {
    /// Create a signer from a merchant private key and its certificate serial number.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MissingSerialNumber`] if the serial is blank.
    pub fn new(
        serial_number: impl Into<String>,
        private_key: RsaPrivateKey,
    ) -> Result<Self, CryptoError> {
        let serial_number = serial_number.into().trim().to_string();
        if serial_number.is_empty() {
            return Err(CryptoError::MissingSerialNumber);
        }
        Ok(Self {
            serial_number,
            private_key,
        })
    }

    /// Create a signer from a PEM private key (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not parse or the serial is blank.
    pub fn from_pem(serial_number: impl Into<String>, pem: &str) -> Result<Self, CryptoError> {
        Self::new(serial_number, load_private_key_pem(pem)?)
    }
}

impl std::fmt::Debug for Sha256WithRsaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha256WithRsaSigner")
            .field("serial_number", &self.serial_number)
            .finish_non_exhaustive()
    }
}

impl Signer for Sha256WithRsaSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha256WithRsa
    }

    fn serial_number(&self) -> &str {
        &self.serial_number
    }

    fn sign(&self, message: &str) -> Result<SignatureResult, CryptoError> {
        if self.serial_number.trim().is_empty() {
            return Err(CryptoError::MissingSerialNumber);
        }
        let hashed = Sha256::digest(message.as_bytes());
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| CryptoError::signing_failed(e.to_string()))?;

        Ok(SignatureResult::new(
            self.serial_number.clone(),
            STANDARD.encode(signature),
        ))
    }
}

/// Platform response verifier (SHA256withRSA).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256WithRsaVerifier;

impl Sha256WithRsaVerifier {
    /// Create a new verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Sha256WithRsaVerifier {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha256WithRsa
    }

    fn verify(
        &self,
        public_key: &RsaPublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let hashed = Sha256::digest(message);
        match public_key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

/// Load an RSA private key from PEM, accepting PKCS#8 (`BEGIN PRIVATE KEY`)
/// and PKCS#1 (`BEGIN RSA PRIVATE KEY`).
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPrivateKey`] if neither encoding parses.
pub fn load_private_key_pem(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        return RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| CryptoError::invalid_private_key(e.to_string()));
    }
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::invalid_private_key(e.to_string()))
}

/// Load an RSA public key from PEM (SPKI `BEGIN PUBLIC KEY` or PKCS#1).
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPublicKey`] if the key does not parse.
pub fn load_public_key_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PUBLIC KEY") {
        return RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| CryptoError::invalid_public_key(e.to_string()));
    }
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| CryptoError::invalid_public_key(e.to_string()))
}

/// Parse an RSA public key from DER-encoded SubjectPublicKeyInfo.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPublicKey`] if the key is not RSA or malformed.
pub fn public_key_from_spki_der(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::invalid_public_key(e.to_string()))
}

/// Decrypt a base64 RSA-OAEP (SHA-1) ciphertext with the merchant private key.
///
/// The provider encrypts sensitive response fields (payer contact details)
/// with the merchant public key using this padding.
///
/// # Errors
///
/// Returns an error on malformed base64 or if decryption fails.
pub fn decrypt_oaep(private_key: &RsaPrivateKey, ciphertext_b64: &str) -> Result<String, CryptoError> {
    let ciphertext = STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|e| CryptoError::invalid_base64("ciphertext", e))?;
    let plaintext = private_key
        .decrypt(Oaep::new::<Sha1>(), &ciphertext)
        .map_err(|e| CryptoError::decryption_failed(e.to_string()))?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::decryption_failed(e.to_string()))
}
