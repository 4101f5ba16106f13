//! Platform certificate store.
//!
//! Holds the provider's response-signing public keys keyed by certificate
//! serial number. Entries come from operator-supplied bootstrap certificates
//! or from `GET /v3/certificates`, and are never removed: a refresh only
//! appends serials it has not seen, and expired certificates are rejected
//! on insertion but not purged once stored.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;
use wxpay_crypto::{decrypt_to_string, public_key_from_spki_der, RsaPublicKey, AEAD_AES_256_GCM};

use crate::error::PayError;

/// Encrypted certificate body from the certificate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptCertificate {
    /// Encryption algorithm, `AEAD_AES_256_GCM`.
    pub algorithm: String,
    /// AEAD associated data.
    #[serde(default)]
    pub associated_data: String,
    /// Base64 ciphertext followed by the tag.
    pub ciphertext: String,
    /// AEAD nonce.
    pub nonce: String,
}

/// One entry of the certificate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Certificate serial number.
    pub serial_no: String,
    /// Provider-declared start of validity.
    #[serde(default)]
    pub effective_time: Option<DateTime<FixedOffset>>,
    /// Provider-declared end of validity.
    #[serde(default)]
    pub expire_time: Option<DateTime<FixedOffset>>,
    /// Encrypted PEM certificate.
    pub encrypt_certificate: EncryptCertificate,
}

/// Body of `GET /v3/certificates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateList {
    /// Certificates currently published by the provider.
    #[serde(default)]
    pub data: Vec<CertificateInfo>,
}

/// A trusted platform certificate.
#[derive(Debug, Clone)]
pub struct PlatformCertificate {
    serial_number: String,
    public_key: RsaPublicKey,
    effective_time: DateTime<Utc>,
    expire_time: DateTime<Utc>,
}

impl PlatformCertificate {
    /// Parse a PEM-encoded X.509 certificate with an RSA public key.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::MalformedInput`] if the PEM or DER is invalid,
    /// or a crypto error if the key is not RSA.
    pub fn from_pem(pem_text: &str) -> Result<Self, PayError> {
        let parsed = pem::parse(pem_text.trim())
            .map_err(|e| PayError::malformed(format!("Failed to parse certificate PEM: {e}")))?;
        Self::from_der(parsed.contents())
    }

    /// Parse a DER-encoded X.509 certificate with an RSA public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate or its key cannot be parsed.
    pub fn from_der(der: &[u8]) -> Result<Self, PayError> {
        let cert = Certificate::from_der(der)
            .map_err(|e| PayError::malformed(format!("Failed to parse certificate DER: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let serial_number = serial_to_hex(tbs.serial_number.as_bytes());
        let spki = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| PayError::malformed(format!("Failed to encode public key: {e}")))?;
        let public_key = public_key_from_spki_der(&spki)?;

        let effective_time = to_utc(tbs.validity.not_before.to_unix_duration().as_secs())?;
        let expire_time = to_utc(tbs.validity.not_after.to_unix_duration().as_secs())?;

        Ok(Self {
            serial_number,
            public_key,
            effective_time,
            expire_time,
        })
    }

    /// Build a certificate from its parts.
    #[must_use]
    pub fn new(
        serial_number: impl Into<String>,
        public_key: RsaPublicKey,
        effective_time: DateTime<Utc>,
        expire_time: DateTime<Utc>,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            public_key,
            effective_time,
            expire_time,
        }
    }

    /// Uppercase hex serial number.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// RSA public key.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Start of validity.
    #[must_use]
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.effective_time
    }

    /// End of validity.
    #[must_use]
    pub fn expire_time(&self) -> DateTime<Utc> {
        self.expire_time
    }

    /// Whether the certificate has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time <= now
    }

    /// Replace the validity window with provider-declared times.
    fn with_declared_validity(mut self, info: &CertificateInfo) -> Self {
        if let Some(effective) = info.effective_time {
            self.effective_time = effective.with_timezone(&Utc);
        }
        if let Some(expire) = info.expire_time {
            self.expire_time = expire.with_timezone(&Utc);
        }
        self
    }
}

/// Result of a single insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New serial stored.
    Inserted,
    /// Certificate already expired; not stored.
    Expired,
    /// Serial already present; existing entry kept.
    Duplicate,
}

/// Summary of one certificate refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Serials added to the store.
    pub inserted: Vec<String>,
    /// Serials skipped because they had expired.
    pub skipped_expired: Vec<String>,
    /// Serials skipped because the store already held them.
    pub skipped_duplicate: Vec<String>,
    /// Serials whose decryption or parsing failed.
    pub failed: Vec<String>,
}

/// Trusted platform certificates keyed by serial number.
///
/// Shared between the client and its verifier through an `Arc`.
#[derive(Debug, Default)]
pub struct CertificateStore {
    certificates: RwLock<HashMap<String, PlatformCertificate>>,
}

impl CertificateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with bootstrap certificates.
    ///
    /// Expired or duplicate bootstrap certificates are skipped like any other insertion.
    #[must_use]
    pub fn with_certificates(certificates: impl IntoIterator<Item = PlatformCertificate>) -> Self {
        let store = Self::new();
        for cert in certificates {
            store.insert(cert);
        }
        store
    }

    /// Insert a certificate unless it is expired or its serial is already stored.
    pub fn insert(&self, certificate: PlatformCertificate) -> InsertOutcome {
        self.insert_at(certificate, Utc::now())
    }

    fn insert_at(&self, certificate: PlatformCertificate, now: DateTime<Utc>) -> InsertOutcome {
        if certificate.is_expired_at(now) {
            debug!(serial = %certificate.serial_number, "Skipping expired certificate");
            return InsertOutcome::Expired;
        }

        let mut certificates = self
            .certificates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if certificates.contains_key(&certificate.serial_number) {
            return InsertOutcome::Duplicate;
        }
        info!(
            serial = %certificate.serial_number,
            expire_time = %certificate.expire_time,
            "Platform certificate added"
        );
        certificates.insert(certificate.serial_number.clone(), certificate);
        InsertOutcome::Inserted
    }

    /// Public key for a serial number.
    ///
    /// # Errors
    ///
    /// Returns [`PayError::UnknownCertificate`] if the serial is not stored.
    pub fn lookup(&self, serial: &str) -> Result<RsaPublicKey, PayError> {
        self.read()
            .get(serial)
            .map(|c| c.public_key.clone())
            .ok_or_else(|| PayError::UnknownCertificate {
                serial: serial.to_string(),
            })
    }

    /// Whether a serial number is stored.
    #[must_use]
    pub fn contains(&self, serial: &str) -> bool {
        self.read().contains_key(serial)
    }

    /// Number of stored certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored serial numbers, sorted.
    #[must_use]
    pub fn serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.read().keys().cloned().collect();
        serials.sort();
        serials
    }

    /// Snapshot of the stored certificates, sorted by serial.
    #[must_use]
    pub fn certificates(&self) -> Vec<PlatformCertificate> {
        let mut certs: Vec<PlatformCertificate> = self.read().values().cloned().collect();
        certs.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        certs
    }

    /// Whether at least one stored certificate is still valid.
    ///
    /// Verification cannot succeed for fresh responses while this is false.
    #[must_use]
    pub fn has_unexpired(&self) -> bool {
        let now = Utc::now();
        self.read().values().any(|c| !c.is_expired_at(now))
    }

    /// Read access, recovering a poisoned lock the same way inserts do.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PlatformCertificate>> {
        self.certificates.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decrypt and insert the entries of a certificate list.
    ///
    /// Entries are handled independently: an entry that fails to decrypt or
    /// parse is logged and reported as failed, and the rest still apply.
    pub fn apply(&self, list: &CertificateList, api_v3_key: &[u8]) -> RefreshReport {
        self.apply_at(list, api_v3_key, Utc::now())
    }

    fn apply_at(
        &self,
        list: &CertificateList,
        api_v3_key: &[u8],
        now: DateTime<Utc>,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();

        for info in &list.data {
            let declared_serial = info.serial_no.trim().to_uppercase();

            if info.expire_time.is_some_and(|t| t.with_timezone(&Utc) <= now) {
                report.skipped_expired.push(declared_serial);
                continue;
            }
            if self.contains(&declared_serial) {
                report.skipped_duplicate.push(declared_serial);
                continue;
            }

            let certificate = match decrypt_certificate(info, api_v3_key) {
                Ok(cert) => cert.with_declared_validity(info),
                Err(e) => {
                    warn!(serial = %declared_serial, error = %e, "Skipping undecryptable certificate");
                    report.failed.push(declared_serial);
                    continue;
                }
            };

            if certificate.serial_number != declared_serial {
                warn!(
                    declared = %declared_serial,
                    actual = %certificate.serial_number,
                    "Certificate serial differs from list entry"
                );
            }

            let serial = certificate.serial_number.clone();
            match self.insert_at(certificate, now) {
                InsertOutcome::Inserted => report.inserted.push(serial),
                InsertOutcome::Expired => report.skipped_expired.push(serial),
                InsertOutcome::Duplicate => report.skipped_duplicate.push(serial),
            }
        }

        report
    }
}

fn decrypt_certificate(
    info: &CertificateInfo,
    api_v3_key: &[u8],
) -> Result<PlatformCertificate, PayError> {
    let encrypted = &info.encrypt_certificate;
    if encrypted.algorithm != AEAD_AES_256_GCM {
        return Err(wxpay_crypto::CryptoError::UnsupportedAlgorithm {
            algorithm: encrypted.algorithm.clone(),
        }
        .into());
    }
    let pem_text = decrypt_to_string(
        api_v3_key,
        &encrypted.associated_data,
        &encrypted.nonce,
        &encrypted.ciphertext,
    )?;
    PlatformCertificate::from_pem(&pem_text)
}

/// Uppercase hex of a DER integer, without leading zero bytes.
#[must_use]
pub fn serial_to_hex(bytes: &[u8]) -> String {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len().saturating_sub(1));
    hex::encode_upper(&bytes[start..])
}

fn to_utc(secs: u64) -> Result<DateTime<Utc>, PayError> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| PayError::malformed(format!("certificate time out of range: {secs}")))
}
