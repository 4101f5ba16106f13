//! Endpoint calls: pagination, bills and complaint notifications.

use std::io::Write;

use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use sha1::{Digest, Sha1};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxpay_core::types::RefundsReq;
use wxpay_core::{ErrorKind, PayError};

use crate::support::{encrypt, signed, signed_status, trusted_client, MCHID};

fn complaints(range: std::ops::Range<usize>) -> Vec<serde_json::Value> {
    range
        .map(|i| {
            json!({
                "complaint_id": format!("2002018202001010800766{i:05}"),
                "complaint_state": "PENDING",
                "complainted_mchid": MCHID,
            })
        })
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn test_list_complaints_follows_pages() {
    let server = MockServer::start().await;
    for (offset, items) in [("0", complaints(0..50)), ("50", complaints(50..60))] {
        let page = json!({"data": items, "limit": 50, "offset": offset.parse::<u32>().unwrap(), "total_count": 60});
        Mock::given(method("GET"))
            .and(path("/v3/merchant-service/complaints-v2"))
            .and(query_param("begin_date", "2021-04-01"))
            .and(query_param("end_date", "2021-04-30"))
            .and(query_param("limit", "50"))
            .and(query_param("offset", offset))
            .respond_with(signed(&page.to_string()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = trusted_client(&server);
    let list = client
        .list_complaints(date(2021, 4, 1), date(2021, 4, 30))
        .await
        .unwrap();
    assert_eq!(list.len(), 60);
    assert_eq!(list[59].complaint_id, "200201820200101080076600059");
}

#[tokio::test]
async fn test_pagination_stops_on_empty_page() {
    let server = MockServer::start().await;
    let histories = (0..50).map(|i| json!({"log_id": format!("L{i}")})).collect::<Vec<_>>();
    for (offset, data) in [("0", histories), ("50", Vec::new())] {
        let page = json!({"data": data, "limit": 50, "offset": offset.parse::<u32>().unwrap(), "total_count": 500});
        Mock::given(method("GET"))
            .and(path("/v3/merchant-service/complaints-v2/C1/negotiation-historys"))
            .and(query_param("offset", offset))
            .respond_with(signed(&page.to_string()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = trusted_client(&server);
    let histories = client.negotiation_histories("C1").await.unwrap();
    assert_eq!(histories.len(), 50);
    assert_eq!(histories[49].log_id, "L49");
}

#[tokio::test]
async fn test_single_page_when_total_fits() {
    let server = MockServer::start().await;
    let page = json!({"data": complaints(0..3), "limit": 50, "offset": 0, "total_count": 3});
    Mock::given(method("GET"))
        .and(path("/v3/merchant-service/complaints-v2"))
        .respond_with(signed(&page.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let list = client
        .list_complaints(date(2021, 4, 1), date(2021, 4, 2))
        .await
        .unwrap();
    assert_eq!(list.len(), 3);
}

// =============================================================================
// Bills
// =============================================================================

const BILL_CSV: &[u8] = b"trade_time,appid,mchid,transaction_id\n`2021-04-01 10:00:00,`wx1,`1900000109,`4200001\n";

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn mount_bill(server: &MockServer, hash_value: &str) {
    let bill = json!({
        "download_url": format!("{}/v3/billdownload/file?token=6XIv5TUPto7pByrTQKhd6kwvyKLG2uY2wMMR8cNXqaA_Cv_isgaUtBzp4QtiozLO", server.uri()),
        "hash_type": "SHA1",
        "hash_value": hash_value,
    });
    Mock::given(method("GET"))
        .and(path("/v3/bill/tradebill"))
        .and(query_param("bill_date", "2021-04-01"))
        .and(query_param("bill_type", "ALL"))
        .and(query_param("tar_type", "GZIP"))
        .respond_with(signed(&bill.to_string()))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/billdownload/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(BILL_CSV)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_trade_bill_downloaded_and_verified() {
    let server = MockServer::start().await;
    mount_bill(&server, &hex::encode(Sha1::digest(BILL_CSV))).await;

    let client = trusted_client(&server);
    let bill = client.trade_bill(date(2021, 4, 1), None).await.unwrap();
    assert_eq!(bill, BILL_CSV);
}

#[tokio::test]
async fn test_bill_digest_mismatch_reported() {
    let server = MockServer::start().await;
    mount_bill(&server, "79bb0f4d1e4a8a1b8e7c5a0e9c1f2a3b4c5d6e7f").await;

    let client = trusted_client(&server);
    let err = client.trade_bill(date(2021, 4, 1), Some("")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    match err {
        PayError::IntegrityError { content, .. } => assert_eq!(content, BILL_CSV),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fundflow_bill_query() {
    let server = MockServer::start().await;
    let bill = json!({
        "download_url": format!("{}/v3/billdownload/file?token=F", server.uri()),
        "hash_type": "SHA1",
        "hash_value": hex::encode(Sha1::digest(BILL_CSV)),
    });
    Mock::given(method("GET"))
        .and(path("/v3/bill/fundflowbill"))
        .and(query_param("bill_date", "2021-04-01"))
        .and(query_param("account_type", "BASIC"))
        .and(query_param("tar_type", "GZIP"))
        .respond_with(signed(&bill.to_string()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/billdownload/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(BILL_CSV)))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let content = client
        .fundflow_bill(date(2021, 4, 1), Some("BASIC"))
        .await
        .unwrap();
    assert_eq!(content, BILL_CSV);
}

// =============================================================================
// Refunds and complaint notifications
// =============================================================================

#[tokio::test]
async fn test_refund_submitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/refund/domestic/refunds"))
        .and(body_json(json!({
            "transaction_id": "4200001",
            "out_refund_no": "R1",
            "amount": {"refund": 50, "total": 100, "currency": "CNY"}
        })))
        .respond_with(signed(
            &json!({
                "refund_id": "50000000382019052709732678859",
                "out_refund_no": "R1",
                "transaction_id": "4200001",
                "status": "PROCESSING",
                "amount": {"refund": 50, "total": 100, "currency": "CNY", "payer_total": 100, "payer_refund": 50}
            })
            .to_string(),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let request: RefundsReq = serde_json::from_value(json!({
        "transaction_id": "4200001",
        "out_refund_no": "R1",
        "amount": {"refund": 50, "total": 100, "currency": "CNY"}
    }))
    .unwrap();
    let client = trusted_client(&server);
    let order = client.refund(&request).await.unwrap();
    assert_eq!(order.status, "PROCESSING");
    assert_eq!(order.amount.payer_refund, 50);
}

#[tokio::test]
async fn test_refund_needs_order_reference() {
    let server = MockServer::start().await;
    let client = trusted_client(&server);
    let request = RefundsReq {
        out_refund_no: "R1".into(),
        ..RefundsReq::default()
    };
    let err = client.refund(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[tokio::test]
async fn test_update_notification_checks_echoed_url() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v3/merchant-service/complaint-notifications"))
        .and(body_json(json!({"url": "https://merchant.example.com/notify"})))
        .respond_with(signed(
            &json!({"mchid": MCHID, "url": "https://merchant.example.com/old"}).to_string(),
        ))
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let err = client
        .update_complaint_notification("https://merchant.example.com/notify")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[tokio::test]
async fn test_notification_lifecycle() {
    let server = MockServer::start().await;
    let registered = json!({"mchid": MCHID, "url": "https://merchant.example.com/notify"}).to_string();
    Mock::given(method("POST"))
        .and(path("/v3/merchant-service/complaint-notifications"))
        .respond_with(signed(&registered))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/merchant-service/complaint-notifications"))
        .respond_with(signed(&registered))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v3/merchant-service/complaint-notifications"))
        .respond_with(signed_status(204, ""))
        .expect(1)
        .mount(&server)
        .await;

    let client = trusted_client(&server);
    let created = client
        .create_complaint_notification("https://merchant.example.com/notify")
        .await
        .unwrap();
    assert_eq!(created.mchid, MCHID);
    assert_eq!(
        client.get_complaint_notification().await.unwrap().url,
        "https://merchant.example.com/notify"
    );
    client.delete_complaint_notification().await.unwrap();
}

#[tokio::test]
async fn test_parse_complaint_notify_with_client_key() {
    let server = MockServer::start().await;
    let client = trusted_client(&server);
    let body = json!({
        "id": "EV-2018022511223320873",
        "create_time": "2015-05-20T13:29:35+08:00",
        "event_type": "COMPLAINT.STATE_CHANGE",
        "resource_type": "encrypt-resource",
        "summary": "complaint state changed",
        "resource": {
            "algorithm": "AEAD_AES_256_GCM",
            "ciphertext": encrypt("fdasflkja484", "complaint", r#"{"complaint_id":"C1","action_type":"MERCHANT_CONFIRM_COMPLETE"}"#),
            "associated_data": "complaint",
            "nonce": "fdasflkja484",
            "original_type": "complaint"
        }
    });
    let event = client
        .parse_complaint_notify(body.to_string().as_bytes())
        .unwrap();
    assert_eq!(event.complaint_id, "C1");
    assert_eq!(event.action_type, "MERCHANT_CONFIRM_COMPLETE");
}
