//! Platform certificate refresh through the bootstrap path.

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};
use wxpay_core::ErrorKind;

use crate::support::{
    client, encrypt, platform_cert_pem, signed, signed_with, PLATFORM_SERIAL,
    PLATFORM_SERIAL_BYTES,
};

const NONCE: &str = "61f9c719728a";

fn entry(serial: &str, pem: &str, expire_time: chrono::DateTime<Utc>) -> serde_json::Value {
    json!({
        "serial_no": serial,
        "effective_time": (Utc::now() - Duration::days(30)).to_rfc3339(),
        "expire_time": expire_time.to_rfc3339(),
        "encrypt_certificate": {
            "algorithm": "AEAD_AES_256_GCM",
            "nonce": NONCE,
            "associated_data": "certificate",
            "ciphertext": encrypt(NONCE, "certificate", pem)
        }
    })
}

async fn mount_list(server: &MockServer, data: Vec<serde_json::Value>) {
    let body = json!({ "data": data }).to_string();
    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed(&body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_inserts_and_then_verifies() {
    let server = MockServer::start().await;
    let pem = platform_cert_pem(&PLATFORM_SERIAL_BYTES, 2099);
    mount_list(&server, vec![entry(PLATFORM_SERIAL, &pem, Utc::now() + Duration::days(365))]).await;
    Mock::given(method("GET"))
        .and(path("/v3/merchant-service/complaint-notifications"))
        .respond_with(signed(r#"{"mchid":"1900000109","url":"https://merchant.example.com/notify"}"#))
        .mount(&server)
        .await;

    let client = client(&server, Vec::new());
    assert!(client.certificate_store().is_empty());

    // Nothing is trusted before the refresh.
    let err = client.get_complaint_notification().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCertificate);

    let report = client.refresh_certificates().await.unwrap();
    assert_eq!(report.inserted, vec![PLATFORM_SERIAL.to_string()]);
    assert!(client.certificate_store().has_unexpired());

    client.get_complaint_notification().await.unwrap();
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let server = MockServer::start().await;
    let pem = platform_cert_pem(&PLATFORM_SERIAL_BYTES, 2099);
    mount_list(&server, vec![entry(PLATFORM_SERIAL, &pem, Utc::now() + Duration::days(365))]).await;

    let client = client(&server, Vec::new());
    client.refresh_certificates().await.unwrap();
    let first = client.certificate_store().serials();

    let report = client.refresh_certificates().await.unwrap();
    assert!(report.inserted.is_empty());
    assert_eq!(report.skipped_duplicate, vec![PLATFORM_SERIAL.to_string()]);
    assert_eq!(client.certificate_store().serials(), first);
}

#[tokio::test]
async fn test_refresh_skips_expired_and_broken_entries() {
    let server = MockServer::start().await;
    let good = platform_cert_pem(&PLATFORM_SERIAL_BYTES, 2099);
    let old = platform_cert_pem(&[0x3A, 0x01], 2021);

    let mut broken = entry("0BAD", &good, Utc::now() + Duration::days(365));
    broken["encrypt_certificate"]["ciphertext"] = json!(encrypt(NONCE, "other-aad", &good));

    mount_list(
        &server,
        vec![
            entry("3A01", &old, Utc::now() - Duration::days(1)),
            broken,
            entry(PLATFORM_SERIAL, &good, Utc::now() + Duration::days(365)),
        ],
    )
    .await;

    let client = client(&server, Vec::new());
    let report = client.refresh_certificates().await.unwrap();
    assert_eq!(report.skipped_expired, vec!["3A01".to_string()]);
    assert_eq!(report.failed, vec!["0BAD".to_string()]);
    assert_eq!(report.inserted, vec![PLATFORM_SERIAL.to_string()]);
    assert_eq!(client.certificate_store().serials(), vec![PLATFORM_SERIAL.to_string()]);
}

#[tokio::test]
async fn test_refresh_still_checks_freshness() {
    let server = MockServer::start().await;
    let body = json!({ "data": [] }).to_string();
    Mock::given(method("GET"))
        .and(path("/v3/certificates"))
        .respond_with(signed_with(
            &body,
            &body,
            PLATFORM_SERIAL,
            Utc::now().timestamp() - 3600,
        ))
        .mount(&server)
        .await;

    let client = client(&server, Vec::new());
    let err = client.refresh_certificates().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleResponse);
}
