//! Response validation.
//!
//! A provider response is trusted only if it carries all signature headers,
//! its timestamp is within the tolerance window, and the signature over
//!
//! ```text
//! TIMESTAMP\nNONCE\nBODY\n
//! ```
//!
//! verifies under the platform certificate named by `Wechatpay-Serial`.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::config::DEFAULT_TOLERANCE;
use crate::error::PayError;
use crate::verifier::Verifier;

/// Response request id header.
pub const REQUEST_ID: &str = "Request-ID";
/// Serial number of the signing platform certificate.
pub const WECHATPAY_SERIAL: &str = "Wechatpay-Serial";
/// Base64 response signature.
pub const WECHATPAY_SIGNATURE: &str = "Wechatpay-Signature";
/// Unix timestamp of the response.
pub const WECHATPAY_TIMESTAMP: &str = "Wechatpay-Timestamp";
/// Response nonce.
pub const WECHATPAY_NONCE: &str = "Wechatpay-Nonce";

/// Checks a received response before its body is used.
pub trait ResponseValidator: Send + Sync {
    /// Validate a response body and its headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the response must not be trusted.
    fn validate(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), PayError>;
}

/// Validator for signed provider responses.
#[derive(Debug, Clone)]
pub struct WechatPayValidator<V> {
    verifier: V,
    tolerance: Duration,
}

impl<V: Verifier> WechatPayValidator<V> {
    /// Create a validator with the default 5 minute tolerance.
    #[must_use]
    pub fn new(verifier: V) -> Self {
        Self {
            verifier,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Set the timestamp tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The underlying verifier.
    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Validate against an explicit current time.
    ///
    /// # Errors
    ///
    /// Same as [`ResponseValidator::validate`].
    pub fn validate_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), PayError> {
        let signed = SignedHeaders::extract(headers)?;

        self.check(&signed, body, now)
            .map_err(|source| PayError::ResponseRejected {
                request_id: signed.request_id.to_string(),
                serial: signed.serial.to_string(),
                source: Box::new(source),
            })
    }

    fn check(&self, signed: &SignedHeaders<'_>, body: &[u8], now: i64) -> Result<(), PayError> {
        let timestamp: i64 = signed.timestamp.parse().map_err(|e| {
            PayError::malformed(format!("invalid timestamp [{}]: {e}", signed.timestamp))
        })?;

        let tolerance_secs = self.tolerance.as_secs();
        if timestamp.abs_diff(now) >= tolerance_secs {
            warn!(
                request_id = %signed.request_id,
                timestamp,
                now,
                "Rejecting stale response"
            );
            return Err(PayError::StaleResponse {
                timestamp,
                now,
                tolerance_secs,
            });
        }

        let signature = STANDARD
            .decode(signed.signature)
            .map_err(|e| PayError::encoding(WECHATPAY_SIGNATURE, e))?;

        let message = build_message(signed.timestamp, signed.nonce, body);
        self.verifier.verify(signed.serial, &message, &signature)?;

        debug!(request_id = %signed.request_id, serial = %signed.serial, "Response verified");
        Ok(())
    }
}

impl<V: Verifier> ResponseValidator for WechatPayValidator<V> {
    fn validate(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), PayError> {
        self.validate_at(headers, body, Utc::now().timestamp())
    }
}

/// Validator that accepts every response.
///
/// Used for bill file downloads, which the provider does not sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl ResponseValidator for NoopValidator {
    fn validate(&self, _headers: &HeaderMap, _body: &[u8]) -> Result<(), PayError> {
        Ok(())
    }
}

/// Canonical response message.
#[must_use]
pub fn build_message(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len() + 3);
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(nonce.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    message.push(b'\n');
    message
}

/// Trimmed header value, `None` when absent, blank or not visible ASCII.
pub(crate) fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

struct SignedHeaders<'a> {
    request_id: &'a str,
    serial: &'a str,
    signature: &'a str,
    timestamp: &'a str,
    nonce: &'a str,
}

impl<'a> SignedHeaders<'a> {
    fn extract(headers: &'a HeaderMap) -> Result<Self, PayError> {
        let request_id = header_value(headers, REQUEST_ID).ok_or(PayError::MissingHeader {
            header: REQUEST_ID,
            request_id: None,
        })?;
        let required = |name: &'static str| {
            header_value(headers, name).ok_or_else(|| PayError::MissingHeader {
                header: name,
                request_id: Some(request_id.to_string()),
            })
        };

        Ok(Self {
            request_id,
            serial: required(WECHATPAY_SERIAL)?,
            signature: required(WECHATPAY_SIGNATURE)?,
            timestamp: required(WECHATPAY_TIMESTAMP)?,
            nonce: required(WECHATPAY_NONCE)?,
        })
    }
}
