//! Algorithm identifiers and signing results.

use serde::{Deserialize, Serialize};

/// Authorization scheme name sent in front of the credential parameters.
pub const AUTHORIZATION_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Algorithm identifier of provider-encrypted resources.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";

/// Request and response signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 over a SHA-256 digest.
    Sha256WithRsa,
}

impl SignatureAlgorithm {
    /// Human-readable algorithm name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256WithRsa => "SHA256withRSA",
        }
    }

    /// Authorization scheme that carries signatures of this algorithm.
    #[must_use]
    pub const fn authorization_scheme(&self) -> &'static str {
        match self {
            Self::Sha256WithRsa => AUTHORIZATION_SCHEME,
        }
    }
}

/// Output of a single signing call.
///
/// Immutable once produced; the signature is standard padded base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureResult {
    serial_number: String,
    signature: String,
}

impl SignatureResult {
    /// Create a result for a serial number and base64 signature.
    #[must_use]
    pub fn new(serial_number: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            signature: signature.into(),
        }
    }

    /// Serial number of the certificate matching the signing key.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Base64-encoded signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}
