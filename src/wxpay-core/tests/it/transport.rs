//! Signed transport against a mock provider.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxpay_core::credential::build_message;
use wxpay_core::{ErrorKind, PayError};
use wxpay_crypto::{Sha256WithRsaVerifier, SignatureVerifier};

use crate::support::{
    authorization_fields, field, merchant_key, signed, signed_with, trusted_client, MCHID,
    MERCHANT_SERIAL, PLATFORM_SERIAL, REQUEST_ID,
};

fn order_body() -> String {
    json!({
        "appid": "wxd678efh567hg6787",
        "mchid": MCHID,
        "out_trade_no": "1217752501201407033233368018",
        "transaction_id": "T1",
        "trade_type": "JSAPI",
        "trade_state": "SUCCESS",
        "trade_state_desc": "paid",
        "success_time": "2018-06-08T10:34:56+08:00",
        "payer": {"openid": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o"},
        "amount": {"total": 100, "payer_total": 100, "currency": "CNY", "payer_currency": "CNY"}
    })
    .to_string()
}

// =============================================================================
// Request signing
// =============================================================================

#[tokio::test]
async fn test_authorization_header_attached_and_verifiable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/pay/transactions/id/T1"))
        .and(query_param("mchid", MCHID))
        .and(header("Accept", "*/*"))
        .and(header("Content-Type", "application/json"))
        .and(header_regex(
            "Authorization",
            r#"^WECHATPAY2-SHA256-RSA2048 mchid="1900000109",nonce_str="[0-9A-Za-z]{32}",timestamp="\d+",serial_no="3775B6A45ACD588826D15E583A95F5DD",signature="[A-Za-z0-9+/=]+"$"#,
        ))
        .and(header_regex("User-Agent", r"^wxpay-rs/"))
        .respond_with(signed(&order_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let order = client.query_order_by_transaction_id("T1").await.unwrap();
    assert_eq!(order.trade_state, "SUCCESS");
    assert_eq!(order.amount.total, 100);

    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0]
        .headers
        .get("Authorization")
        .unwrap()
        .to_str()
        .unwrap();
    let fields = authorization_fields(authorization);
    assert_eq!(field(&fields, "serial_no"), MERCHANT_SERIAL);

    let timestamp: i64 = field(&fields, "timestamp").parse().unwrap();
    assert!((Utc::now().timestamp() - timestamp).abs() <= 5);

    let message = build_message(
        "GET",
        "/v3/pay/transactions/id/T1?mchid=1900000109",
        timestamp,
        field(&fields, "nonce_str"),
        "",
    );
    let signature = STANDARD.decode(field(&fields, "signature")).unwrap();
    assert!(Sha256WithRsaVerifier::new()
        .verify(&merchant_key().to_public_key(), message.as_bytes(), &signature)
        .unwrap());
}

#[tokio::test]
async fn test_post_signs_exact_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/merchant-service/complaints-v2/C1/complete"))
        .and(wiremock::matchers::body_json(json!({"complainted_mchid": MCHID})))
        .respond_with(signed(""))
        .expect(1)
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    client.complete_complaint("C1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let fields = authorization_fields(request.headers.get("Authorization").unwrap().to_str().unwrap());
    let message = build_message(
        "POST",
        "/v3/merchant-service/complaints-v2/C1/complete",
        field(&fields, "timestamp").parse().unwrap(),
        field(&fields, "nonce_str"),
        std::str::from_utf8(&request.body).unwrap(),
    );
    let signature = STANDARD.decode(field(&fields, "signature")).unwrap();
    assert!(Sha256WithRsaVerifier::new()
        .verify(&merchant_key().to_public_key(), message.as_bytes(), &signature)
        .unwrap());
}

// =============================================================================
// Response handling
// =============================================================================

#[tokio::test]
async fn test_provider_error_on_non_2xx() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/pay/transactions/out-trade-no/O1"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("Request-ID", REQUEST_ID)
                .set_body_string(r#"{"code":"ORDER_NOT_EXIST","message":"order not exist"}"#),
        )
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client.query_order_by_out_trade_no("O1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(err.request_id(), Some(REQUEST_ID));
    match err {
        PayError::Provider {
            status,
            code,
            message,
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(code, "ORDER_NOT_EXIST");
            assert_eq!(message, "order not exist");
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unsigned_response_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(order_body()))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client.query_order_by_transaction_id("T1").await.unwrap_err();
    assert!(matches!(
        err,
        PayError::MissingHeader {
            header: "Request-ID",
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_serial_rejected() {
    let server = MockServer::start().await;
    let body = order_body();
    Mock::given(method("GET"))
        .respond_with(signed_with(&body, &body, "FFFF0000", Utc::now().timestamp()))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client.query_order_by_transaction_id("T1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCertificate);
    assert_eq!(err.request_id(), Some(REQUEST_ID));
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let server = MockServer::start().await;
    let body = order_body();
    let tampered = body.replace("\"total\":100", "\"total\":1");
    Mock::given(method("GET"))
        .respond_with(signed_with(&tampered, &body, PLATFORM_SERIAL, Utc::now().timestamp()))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client.query_order_by_transaction_id("T1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    assert!(err.is_tampering());
}

#[tokio::test]
async fn test_stale_response_rejected() {
    let server = MockServer::start().await;
    let body = order_body();
    Mock::given(method("GET"))
        .respond_with(signed_with(
            &body,
            &body,
            PLATFORM_SERIAL,
            Utc::now().timestamp() - 600,
        ))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client.query_order_by_transaction_id("T1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleResponse);
}
