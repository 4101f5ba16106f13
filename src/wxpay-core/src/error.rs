//! Error types for the request and response pipeline.

use thiserror::Error;
use wxpay_crypto::CryptoError;

/// Coarse classification of a [`PayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or unusable merchant configuration.
    Config,
    /// Blank or structurally invalid input.
    MalformedInput,
    /// Base64 or similar decoding failure.
    Encoding,
    /// Response timestamp outside the tolerance window.
    StaleResponse,
    /// Required response header absent or blank.
    MissingHeader,
    /// Response signed by a certificate the store does not hold.
    UnknownCertificate,
    /// Response signature does not match.
    SignatureMismatch,
    /// Network, timeout or I/O failure.
    Transport,
    /// Provider answered with a non-2xx status.
    Provider,
    /// Authenticated or RSA-OAEP decryption failed.
    Decryption,
    /// Downloaded content does not match its declared digest.
    Integrity,
}

/// Errors returned by the client, transport and validation layers.
#[derive(Debug, Error)]
pub enum PayError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },

    /// Input was blank or could not be interpreted.
    #[error("Malformed input: {message}")]
    MalformedInput {
        /// Error message.
        message: String,
    },

    /// A field could not be decoded.
    #[error("Invalid encoding in {field}: {message}")]
    EncodingError {
        /// Name of the field being decoded.
        field: String,
        /// Decoder message.
        message: String,
    },

    /// A required response header is missing or blank.
    #[error("empty {header}, request-id=[{}]", request_id.as_deref().unwrap_or(""))]
    MissingHeader {
        /// Header name.
        header: &'static str,
        /// `Request-ID` of the response, when present.
        request_id: Option<String>,
    },

    /// Response timestamp is too far from local time.
    #[error("timestamp=[{timestamp}] expires, now=[{now}], tolerance={tolerance_secs}s")]
    StaleResponse {
        /// Timestamp from `Wechatpay-Timestamp`.
        timestamp: i64,
        /// Local Unix time when the check ran.
        now: i64,
        /// Allowed skew in seconds.
        tolerance_secs: u64,
    },

    /// No trusted certificate with this serial number.
    #[error("certificate {serial} not found in store")]
    UnknownCertificate {
        /// Serial number from `Wechatpay-Serial`.
        serial: String,
    },

    /// Signature did not verify under the certificate's public key.
    #[error("signature mismatch for certificate {serial}")]
    SignatureMismatch {
        /// Serial number of the certificate used.
        serial: String,
    },

    /// Response validation failed; wraps the cause with response context.
    #[error("validate response failed, request-id=[{request_id}], serial=[{serial}]: {source}")]
    ResponseRejected {
        /// `Request-ID` of the rejected response.
        request_id: String,
        /// `Wechatpay-Serial` of the rejected response.
        serial: String,
        /// Underlying validation failure.
        #[source]
        source: Box<PayError>,
    },

    /// HTTP transport failure.
    #[error("HTTPS error: {message}")]
    HttpsError {
        /// Error message.
        message: String,
        /// Whether the failure was a timeout or connection failure.
        retryable: bool,
    },

    /// Provider returned a non-2xx response.
    #[error("error http response:[StatusCode: {status} Code: {code} Message: {message}]")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Provider error code, empty if the body was not a JSON error.
        code: String,
        /// Provider error message.
        message: String,
        /// Structured error details, when present.
        details: Option<serde_json::Value>,
        /// Raw response body.
        body: String,
        /// `Request-ID` header, when present.
        request_id: Option<String>,
    },

    /// Downloaded content failed its digest check.
    #[error("digest mismatch: computed [{actual}], declared [{expected}]")]
    IntegrityError {
        /// Digest declared by the provider.
        expected: String,
        /// Digest computed locally.
        actual: String,
        /// The downloaded content.
        content: Vec<u8>,
    },

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cryptographic error.
    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

impl PayError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a malformed input error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create an encoding error for the named field.
    #[must_use]
    pub fn encoding(field: impl Into<String>, message: impl ToString) -> Self {
        Self::EncodingError {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Create a transport error from a `reqwest` failure.
    #[must_use]
    pub fn transport(context: &str, error: &reqwest::Error) -> Self {
        Self::HttpsError {
            message: format!("{context}: {error}"),
            retryable: error.is_timeout() || error.is_connect(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError { .. } => ErrorKind::Config,
            Self::MalformedInput { .. } | Self::Json(_) => ErrorKind::MalformedInput,
            Self::EncodingError { .. } => ErrorKind::Encoding,
            Self::MissingHeader { .. } => ErrorKind::MissingHeader,
            Self::StaleResponse { .. } => ErrorKind::StaleResponse,
            Self::UnknownCertificate { .. } => ErrorKind::UnknownCertificate,
            Self::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            Self::ResponseRejected { source, .. } => source.kind(),
            Self::HttpsError { .. } => ErrorKind::Transport,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::IntegrityError { .. } => ErrorKind::Integrity,
            Self::CryptoError(e) => match e {
                CryptoError::InvalidBase64 { .. } => ErrorKind::Encoding,
                CryptoError::VerificationFailed => ErrorKind::SignatureMismatch,
                CryptoError::DecryptionFailed { .. }
                | CryptoError::InvalidNonceLength { .. }
                | CryptoError::UnsupportedAlgorithm { .. } => ErrorKind::Decryption,
                CryptoError::InvalidPrivateKey { .. }
                | CryptoError::InvalidPublicKey { .. }
                | CryptoError::MissingSerialNumber
                | CryptoError::SigningFailed { .. }
                | CryptoError::InvalidKeyLength { .. } => ErrorKind::Config,
            },
        }
    }

    /// Check if this error indicates a forged, replayed or corrupted response.
    #[must_use]
    pub fn is_tampering(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SignatureMismatch | ErrorKind::StaleResponse | ErrorKind::Integrity
        )
    }

    /// Check if the request may succeed when sent again unchanged.
    #[must_use]
    pub fn is_retryable_transport(&self) -> bool {
        match self {
            Self::HttpsError { retryable, .. } => *retryable,
            Self::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// `Request-ID` attached to this error, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::ResponseRejected { request_id, .. } => Some(request_id),
            Self::MissingHeader { request_id, .. } | Self::Provider { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }
}
