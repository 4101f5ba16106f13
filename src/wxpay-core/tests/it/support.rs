//! Shared fixtures: merchant and platform keys, platform certificates,
//! signed mock responses and a client pointed at a mock server.

use std::sync::OnceLock;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use wiremock::{MockServer, ResponseTemplate};
use wxpay_core::{ApiV3Key, ClientConfig, PlatformCertificate, WechatPayClient, WechatPayCredentials};
use wxpay_crypto::{Sha256WithRsaSigner, Signer};

pub const MCHID: &str = "1900000109";
pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD";
pub const API_V3_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const REQUEST_ID: &str = "08F78BB5AF0D11E0";

/// Serial of the platform certificate, as DER integer bytes.
pub const PLATFORM_SERIAL_BYTES: [u8; 8] = [0x51, 0x57, 0xF0, 0x9E, 0xFD, 0xC0, 0x96, 0xDE];
/// Same serial as it appears in `Wechatpay-Serial`.
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE";

pub fn merchant_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap())
}

pub fn platform_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap())
}

/// Self-signed platform certificate for `platform_key()`.
pub fn platform_cert_pem(serial: &[u8], not_after_year: i32) -> String {
    let key_pem = platform_key().to_pkcs8_pem(LineEnding::LF).unwrap();
    let key_pair =
        rcgen::KeyPair::from_pkcs8_pem_and_sign_algo(key_pem.as_str(), &rcgen::PKCS_RSA_SHA256)
            .unwrap();

    let mut params = rcgen::CertificateParams::new(vec!["wechatpay-platform".to_string()]).unwrap();
    params.serial_number = Some(serial.to_vec().into());
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(not_after_year, 1, 1);
    params.self_signed(&key_pair).unwrap().pem()
}

pub fn platform_certificate() -> PlatformCertificate {
    PlatformCertificate::from_pem(&platform_cert_pem(&PLATFORM_SERIAL_BYTES, 2099)).unwrap()
}

pub fn credentials() -> WechatPayCredentials {
    let signer = Sha256WithRsaSigner::new(MERCHANT_SERIAL, merchant_key().clone()).unwrap();
    WechatPayCredentials::new(MCHID, signer).unwrap()
}

pub fn client(server: &MockServer, certificates: Vec<PlatformCertificate>) -> WechatPayClient {
    let config = ClientConfig::default().with_base_url(server.uri());
    WechatPayClient::new(
        &config,
        credentials(),
        ApiV3Key::new(API_V3_KEY).unwrap(),
        certificates,
    )
    .unwrap()
    .with_merchant_key(merchant_key().clone())
}

/// Client trusting the platform certificate.
pub fn trusted_client(server: &MockServer) -> WechatPayClient {
    client(server, vec![platform_certificate()])
}

/// 200 response signed by the platform key.
pub fn signed(body: &str) -> ResponseTemplate {
    signed_with(body, body, PLATFORM_SERIAL, Utc::now().timestamp())
}

/// 200 response whose signature covers `signed_body` but which returns `body`.
pub fn signed_with(body: &str, signed_body: &str, serial: &str, timestamp: i64) -> ResponseTemplate {
    signed_with_status(200, body, signed_body, serial, timestamp)
}

/// Signed response with an explicit HTTP status.
pub fn signed_status(status: u16, body: &str) -> ResponseTemplate {
    signed_with_status(status, body, body, PLATFORM_SERIAL, Utc::now().timestamp())
}

fn signed_with_status(
    status: u16,
    body: &str,
    signed_body: &str,
    serial: &str,
    timestamp: i64,
) -> ResponseTemplate {
    let nonce = "593BEC0C930BF1AF";
    let message = format!("{timestamp}\n{nonce}\n{signed_body}\n");
    let signature = Sha256WithRsaSigner::new(serial, platform_key().clone())
        .unwrap()
        .sign(&message)
        .unwrap();

    ResponseTemplate::new(status)
        .insert_header("Request-ID", REQUEST_ID)
        .insert_header("Wechatpay-Serial", serial)
        .insert_header("Wechatpay-Signature", signature.signature())
        .insert_header("Wechatpay-Timestamp", timestamp.to_string().as_str())
        .insert_header("Wechatpay-Nonce", nonce)
        .insert_header("Content-Type", "application/json")
        .set_body_string(body)
}

/// AES-256-GCM encrypt with the API v3 key, base64 of ciphertext plus tag.
pub fn encrypt(nonce: &str, aad: &str, plaintext: &str) -> String {
    let cipher = Aes256Gcm::new_from_slice(API_V3_KEY.as_bytes()).unwrap();
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext.as_bytes(),
                aad: aad.as_bytes(),
            },
        )
        .unwrap();
    STANDARD.encode(sealed)
}

/// Fields of an `Authorization` header value.
pub fn authorization_fields(header: &str) -> Vec<(String, String)> {
    let params = header
        .strip_prefix("WECHATPAY2-SHA256-RSA2048 ")
        .expect("authorization scheme");
    params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.trim_matches('"').to_string()))
        .collect()
}

pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> &'a str {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_default()
}
