//! Encrypted resources and notification callbacks.

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wxpay_crypto::{decrypt_aes_256_gcm, CryptoError, AEAD_AES_256_GCM};

use crate::config::ApiV3Key;
use crate::error::PayError;

/// Provider-encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    /// Encryption algorithm; only `AEAD_AES_256_GCM` is defined.
    pub algorithm: String,
    /// Base64 ciphertext followed by the tag.
    pub ciphertext: String,
    /// AEAD associated data, may be empty.
    #[serde(default)]
    pub associated_data: String,
    /// AEAD nonce.
    pub nonce: String,
    /// Object type before encryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

impl EncryptedResource {
    /// Decrypt to raw bytes.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported algorithm or any decryption failure.
    pub fn decrypt(&self, key: &ApiV3Key) -> Result<Vec<u8>, PayError> {
        if self.algorithm != AEAD_AES_256_GCM {
            return Err(CryptoError::UnsupportedAlgorithm {
                algorithm: self.algorithm.clone(),
            }
            .into());
        }
        Ok(decrypt_aes_256_gcm(
            key.as_bytes(),
            &self.associated_data,
            &self.nonce,
            &self.ciphertext,
        )?)
    }

    /// Decrypt to UTF-8 text.
    ///
    /// # Errors
    ///
    /// Same as [`decrypt`](Self::decrypt), plus non-UTF-8 plaintext.
    pub fn decrypt_to_string(&self, key: &ApiV3Key) -> Result<String, PayError> {
        String::from_utf8(self.decrypt(key)?)
            .map_err(|e| CryptoError::decryption_failed(e.to_string()).into())
    }

    /// Decrypt and decode JSON plaintext.
    ///
    /// # Errors
    ///
    /// Same as [`decrypt`](Self::decrypt), plus JSON decoding errors.
    pub fn decrypt_json<T: DeserializeOwned>(&self, key: &ApiV3Key) -> Result<T, PayError> {
        Ok(serde_json::from_slice(&self.decrypt(key)?)?)
    }
}

/// Complaint notification callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintEvent {
    /// Notification id.
    pub id: String,
    /// Notification creation time.
    #[serde(default)]
    pub create_time: Option<DateTime<FixedOffset>>,
    /// `COMPLAINT.CREATE` or `COMPLAINT.STATE_CHANGE`.
    #[serde(default)]
    pub event_type: String,
    /// Resource type, `encrypt-resource`.
    #[serde(default)]
    pub resource_type: String,
    /// Callback summary.
    #[serde(default)]
    pub summary: String,
    /// Encrypted complaint reference.
    pub resource: EncryptedResource,
    /// Complaint id, from the decrypted resource.
    #[serde(default)]
    pub complaint_id: String,
    /// Action that triggered the callback, from the decrypted resource.
    #[serde(default)]
    pub action_type: String,
}

#[derive(Deserialize)]
struct ComplaintResource {
    complaint_id: String,
    #[serde(default)]
    action_type: String,
}

/// Parse a complaint callback body and decrypt its resource.
///
/// # Errors
///
/// Fails if the body is not a notification or the resource does not decrypt.
pub fn parse_complaint_notify(body: &[u8], key: &ApiV3Key) -> Result<ComplaintEvent, PayError> {
    let mut event: ComplaintEvent = serde_json::from_slice(body)?;
    let resource: ComplaintResource = event.resource.decrypt_json(key)?;
    event.complaint_id = resource.complaint_id;
    event.action_type = resource.action_type;
    Ok(event)
}
