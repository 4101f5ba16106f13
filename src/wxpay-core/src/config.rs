//! Configuration for the API client.

use std::time::Duration;

use crate::error::PayError;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// Default allowed skew between a response timestamp and local time.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Transport and validation settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Total request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Response timestamp tolerance window.
    pub tolerance: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ClientConfig {
    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the total request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Set the response timestamp tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Merchant API v3 key, the 32-byte secret for provider-encrypted payloads.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiV3Key([u8; 32]);

impl ApiV3Key {
    /// Wrap a key, checking its length.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::ConfigError`] if the key is not exactly 32 bytes.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, PayError> {
        let key = key.as_ref();
        let bytes: [u8; 32] = key.try_into().map_err(|_| {
            PayError::config(format!("API v3 key must be 32 bytes, got {}", key.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ApiV3Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiV3Key(..)")
    }
}
