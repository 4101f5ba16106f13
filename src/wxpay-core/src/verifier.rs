//! Response signature verifiers.

use std::sync::Arc;

use wxpay_crypto::{Sha256WithRsaVerifier, SignatureVerifier};

use crate::certificates::CertificateStore;
use crate::error::PayError;

/// Checks a response signature made by a platform certificate.
pub trait Verifier: Send + Sync {
    /// Verify `signature` over `message` for the certificate `serial`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank, the certificate is unknown,
    /// or the signature does not match.
    fn verify(&self, serial: &str, message: &[u8], signature: &[u8]) -> Result<(), PayError>;
}

/// Verifier backed by the platform certificate store.
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    store: Arc<CertificateStore>,
    verifier: Sha256WithRsaVerifier,
}

impl CertificateVerifier {
    /// Create a verifier over a shared certificate store.
    #[must_use]
    pub fn new(store: Arc<CertificateStore>) -> Self {
        Self {
            store,
            verifier: Sha256WithRsaVerifier::new(),
        }
    }

    /// The certificate store consulted by this verifier.
    #[must_use]
    pub fn store(&self) -> &Arc<CertificateStore> {
        &self.store
    }
}

impl Verifier for CertificateVerifier {
    fn verify(&self, serial: &str, message: &[u8], signature: &[u8]) -> Result<(), PayError> {
        if serial.trim().is_empty() {
            return Err(PayError::malformed("serial number is empty"));
        }
        if message.iter().all(u8::is_ascii_whitespace) {
            return Err(PayError::malformed("message is empty"));
        }
        if signature.is_empty() {
            return Err(PayError::malformed("signature is empty"));
        }

        let public_key = self.store.lookup(serial)?;
        if self.verifier.verify(&public_key, message, signature)? {
            Ok(())
        } else {
            Err(PayError::SignatureMismatch {
                serial: serial.to_string(),
            })
        }
    }
}

/// Verifier that accepts every signature.
///
/// Only for bootstrapping the certificate store: the first
/// `GET /v3/certificates` cannot be verified before any certificate is
/// trusted. Headers and timestamp are still checked by the validator, and
/// the certificate list itself is protected by the API v3 key. Never use it
/// for business responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVerifier;

impl Verifier for NullVerifier {
    fn verify(&self, _serial: &str, _message: &[u8], _signature: &[u8]) -> Result<(), PayError> {
        Ok(())
    }
}
