//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid private key format or content.
    #[error("Invalid private key: {reason}")]
    InvalidPrivateKey {
        /// Reason the key is invalid.
        reason: String,
    },

    /// Invalid public key or certificate key material.
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey {
        /// Reason the key is invalid.
        reason: String,
    },

    /// Merchant certificate serial number is missing or blank.
    #[error("Merchant certificate serial number must not be empty")]
    MissingSerialNumber,

    /// Signing operation failed.
    #[error("Signing failed: {reason}")]
    SigningFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// Signature verification failed.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Input was not valid base64.
    #[error("Invalid base64 in {field}: {reason}")]
    InvalidBase64 {
        /// Which input was malformed.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Symmetric key has the wrong length.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// AEAD nonce has the wrong length.
    #[error("Invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength {
        /// Required length in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// Authenticated decryption failed (tag mismatch or corrupted ciphertext).
    #[error("Decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// Algorithm not supported.
    #[error("Algorithm not supported: {algorithm}")]
    UnsupportedAlgorithm {
        /// The unsupported algorithm identifier.
        algorithm: String,
    },
}

impl CryptoError {
    /// Create an invalid private key error.
    #[must_use]
    pub fn invalid_private_key(reason: impl Into<String>) -> Self {
        Self::InvalidPrivateKey {
            reason: reason.into(),
        }
    }

    /// Create an invalid public key error.
    #[must_use]
    pub fn invalid_public_key(reason: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            reason: reason.into(),
        }
    }

    /// Create a signing failed error.
    #[must_use]
    pub fn signing_failed(reason: impl Into<String>) -> Self {
        Self::SigningFailed {
            reason: reason.into(),
        }
    }

    /// Create a decryption failed error.
    #[must_use]
    pub fn decryption_failed(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid base64 error for the named input.
    #[must_use]
    pub fn invalid_base64(field: &'static str, reason: impl ToString) -> Self {
        Self::InvalidBase64 {
            field,
            reason: reason.to_string(),
        }
    }

    /// Whether this error stems from key or serial configuration rather than input data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPrivateKey { .. }
                | Self::InvalidPublicKey { .. }
                | Self::MissingSerialNumber
                | Self::InvalidKeyLength { .. }
        )
    }
}
