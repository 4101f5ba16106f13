//! `Authorization` header generation.
//!
//! Every outgoing request is signed over a canonical message:
//!
//! ```text
//! METHOD\nCANONICAL_URL\nTIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! where `CANONICAL_URL` is the absolute path plus query string and `BODY` is
//! the exact request body (empty for `GET`).

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::debug;
use wxpay_crypto::{Sha256WithRsaSigner, Signer};

use crate::error::PayError;

/// Length of a generated request nonce.
pub const NONCE_LEN: usize = 32;

/// Produces `Authorization` header values for outgoing requests.
pub trait Credential: Send + Sync {
    /// Merchant ID the requests are made for.
    fn mchid(&self) -> &str;

    /// Build the header for a request.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    fn generate_authorization_header(
        &self,
        method: &str,
        canonical_url: &str,
        body: &str,
    ) -> Result<String, PayError>;
}

/// Merchant credential: merchant ID plus a signer bound to the merchant certificate.
///
/// Any [`Signer`] works; the default is the software SHA256withRSA signer.
pub struct WechatPayCredentials<S = Sha256WithRsaSigner> {
    mchid: String,
    signer: S,
}

impl<S: Signer> std::fmt::Debug for WechatPayCredentials<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatPayCredentials")
            .field("mchid", &self.mchid)
            .field("serial_number", &self.signer.serial_number())
            .finish_non_exhaustive()
    }
}

impl<S: Signer> WechatPayCredentials<S> {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::ConfigError`] if the merchant ID is blank.
    pub fn new(mchid: impl Into<String>, signer: S) -> Result<Self, PayError> {
        let mchid = mchid.into().trim().to_string();
        if mchid.is_empty() {
            return Err(PayError::config("merchant id must not be empty"));
        }
        Ok(Self { mchid, signer })
    }

    /// Merchant ID.
    #[must_use]
    pub fn mchid(&self) -> &str {
        &self.mchid
    }

    /// Merchant certificate serial number.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        self.signer.serial_number()
    }

    /// The signer behind this credential.
    #[must_use]
    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Build the header with an explicit timestamp and nonce.
    ///
    /// Deterministic for a given input; [`Credential::generate_authorization_header`]
    /// calls this with the current time and a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn authorization_with(
        &self,
        method: &str,
        canonical_url: &str,
        body: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Result<String, PayError> {
        let message = build_message(method, canonical_url, timestamp, nonce, body);
        let result = self.signer.sign(&message)?;

        Ok(format!(
            r#"{} mchid="{}",nonce_str="{}",timestamp="{}",serial_no="{}",signature="{}""#,
            self.signer.algorithm().authorization_scheme(),
            self.mchid,
            nonce,
            timestamp,
            result.serial_number(),
            result.signature(),
        ))
    }
}

impl<S: Signer> Credential for WechatPayCredentials<S> {
    fn mchid(&self) -> &str {
        &self.mchid
    }

    fn generate_authorization_header(
        &self,
        method: &str,
        canonical_url: &str,
        body: &str,
    ) -> Result<String, PayError> {
        let nonce = generate_nonce();
        let timestamp = Utc::now().timestamp();
        debug!(method = %method, url = %canonical_url, timestamp, "Signing request");
        self.authorization_with(method, canonical_url, body, timestamp, &nonce)
    }
}

/// Canonical request message.
#[must_use]
pub fn build_message(
    method: &str,
    canonical_url: &str,
    timestamp: i64,
    nonce: &str,
    body: &str,
) -> String {
    format!("{method}\n{canonical_url}\n{timestamp}\n{nonce}\n{body}\n")
}

/// 32 characters from `[0-9a-zA-Z]`, drawn from the OS CSPRNG.
#[must_use]
pub fn generate_nonce() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
