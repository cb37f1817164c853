use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use invoice_engine::{
    db_types::{EmailChannel, InvoiceId, InvoiceStatus, InvoiceUpdate, NewInvoice},
    test_utils::{CountingLedger, MemoryLedger},
    traits::{GatewayStatus, LedgerStore, UpstreamError},
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use super::{
    helpers::{send_request, test_api},
    mocks::{MockGateway, MockMailer, MockPriceFeed},
};

fn id(s: &str) -> InvoiceId {
    s.parse().unwrap()
}

fn quiet_collaborators() -> (MockGateway, MockMailer, MockPriceFeed) {
    let mut gateway = MockGateway::new();
    gateway.expect_authoritative_status().never();
    let mut mailer = MockMailer::new();
    mailer.expect_send().never();
    let mut feed = MockPriceFeed::new();
    feed.expect_name().returning(|| "mock".to_string());
    feed.expect_fetch_spot_price().never();
    (gateway, mailer, feed)
}

fn create_request(body: Value) -> TestRequest {
    TestRequest::post().uri("/invoice").set_json(body)
}

#[actix_web::test]
async fn create_invoice_twice() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    let body = json!({
        "invoiceId": "inv_C2",
        "amount": "25.50",
        "currency": "usd",
        "email": " buyer@example.com ",
        "walletAddress": "0x52908400098527886E0F7030069857D2E4169EE7"
    });
    let (gateway, mailer, feed) = quiet_collaborators();
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let (status, body_text) = send_request(create_request(body.clone()), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let view = serde_json::from_str::<Value>(&body_text).unwrap();
    assert_eq!(view["invoiceId"], "inv_C2");
    assert_eq!(view["status"], "CREATED");
    assert_eq!(view["currency"], "USD");
    assert_eq!(view["email"], "buyer@example.com");
    assert_eq!(view["walletNetwork"], "EVM");

    let (gateway, mailer, feed) = quiet_collaborators();
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let (status, _) = send_request(create_request(body), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.inner().len().await, 1);
}

#[actix_web::test]
async fn create_invoice_with_bad_wallet() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    let (gateway, mailer, feed) = quiet_collaborators();
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let body = json!({ "invoiceId": "inv_C", "amount": "10", "currency": "USD", "walletAddress": "0x123" });
    let (status, body) = send_request(create_request(body), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = serde_json::from_str::<Value>(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Invalid input."));
    assert!(ledger.inner().is_empty().await);
}

#[actix_web::test]
async fn status_check_of_a_settled_invoice() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    ledger.inner().append(NewInvoice::new(id("inv_B"), dec!(100), "USD").unwrap()).await.unwrap();
    let update = InvoiceUpdate::transition(InvoiceStatus::Success).with_tokens(dec!(0.08), dec!(1250));
    ledger.inner().update_fields(&id("inv_B"), update).await.unwrap();
    for channel in [EmailChannel::User, EmailChannel::Admin] {
        let update = InvoiceUpdate::notified(channel, Utc::now());
        ledger.inner().update_fields(&id("inv_B"), update).await.unwrap();
    }
    // A settled invoice is never polled again.
    let (gateway, mailer, feed) = quiet_collaborators();
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let req = TestRequest::get().uri("/invoice/inv_B/status");
    let (status, body) = send_request(req, api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let view = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(view["status"], "SUCCESS");
    assert_eq!(view["displayStatus"], "SUCCESS");
    assert_eq!(view["tokensPurchased"], "1250");
    assert_eq!(ledger.writes(), 0);
}

#[actix_web::test]
async fn status_check_when_the_gateway_is_down() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    ledger.inner().append(NewInvoice::new(id("inv_D"), dec!(100), "USD").unwrap()).await.unwrap();
    let (_, mailer, feed) = quiet_collaborators();
    let mut gateway = MockGateway::new();
    gateway
        .expect_authoritative_status()
        .times(3)
        .returning(|_| Err(UpstreamError::Status { status: 500, message: "boom".into() }));
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let req = TestRequest::get().uri("/invoice/inv_D/status");
    let (status, body) = send_request(req, api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let view = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(view["status"], "CREATED");
    assert_eq!(ledger.writes(), 0);
}

#[actix_web::test]
async fn status_check_of_an_unknown_invoice() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    let (_, mailer, feed) = quiet_collaborators();
    let mut gateway = MockGateway::new();
    gateway
        .expect_authoritative_status()
        .returning(|_| Ok(GatewayStatus { raw_status: Some("PROCESSING".into()), metadata: Value::Null }));
    let api = test_api(ledger.clone(), gateway, mailer, feed);
    let req = TestRequest::get().uri("/invoice/inv_X/status");
    let (status, body) = send_request(req, api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let view = serde_json::from_str::<Value>(&body).unwrap();
    assert_eq!(view["invoiceId"], "inv_X");
    assert_eq!(view["status"], "CREATED");
    assert!(ledger.inner().is_empty().await);
}
