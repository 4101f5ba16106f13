//! Bill download post-processing.
//!
//! Bill files are served unsigned. Their integrity comes from the digest the
//! provider declares in the (signed) bill application response.

use std::io::Read;

use flate2::read::GzDecoder;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::error::PayError;
use crate::types::Bill;

/// Digest algorithm the provider declares for bills.
pub const HASH_TYPE_SHA1: &str = "SHA1";

/// Compression requested for bill downloads.
pub const TAR_TYPE_GZIP: &str = "GZIP";

/// Trade bill type when the caller does not pick one.
pub const DEFAULT_BILL_TYPE: &str = "ALL";

/// Decompress a downloaded bill and check it against the declared digest.
///
/// A `GZIP` bill that does not inflate is kept as received. Digests other
/// than `SHA1` are not checked.
///
/// # Errors
///
/// Returns [`PayError::IntegrityError`], carrying the content, when the
/// digest does not match.
pub fn unpack(bill: &Bill, body: Vec<u8>) -> Result<Vec<u8>, PayError> {
    let content = if bill.tar_type.eq_ignore_ascii_case(TAR_TYPE_GZIP) {
        gunzip(&body).unwrap_or_else(|e| {
            warn!(error = %e, "Bill is not valid gzip, keeping raw bytes");
            body
        })
    } else {
        body
    };

    if !bill.hash_type.eq_ignore_ascii_case(HASH_TYPE_SHA1) {
        warn!(hash_type = %bill.hash_type, "Unsupported bill digest, skipping check");
        return Ok(content);
    }

    let actual = hex::encode(Sha1::digest(&content));
    let expected = bill.hash_value.trim().to_ascii_lowercase();
    if !wxpay_crypto::constant_time_eq(actual.as_bytes(), expected.as_bytes()) {
        warn!(expected = %expected, actual = %actual, "Bill digest mismatch");
        return Err(PayError::IntegrityError {
            expected,
            actual,
            content,
        });
    }

    debug!(len = content.len(), "Bill digest verified");
    Ok(content)
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
