use actix_web::http::StatusCode;
use invoice_engine::{
    db_types::{InvoiceId, InvoiceStatus, NewInvoice},
    test_utils::{CountingLedger, MemoryLedger},
    traits::{GatewayStatus, LedgerStore, MessageId, NotificationChannel, UpstreamError},
};
use rust_decimal_macros::dec;
use serde_json::Value;

use super::{
    helpers::{send_request, signed_webhook, test_api, unsigned_webhook, TestLedger},
    mocks::{MockGateway, MockMailer, MockPriceFeed},
};
use crate::data_objects::WebhookResponse;

fn id(s: &str) -> InvoiceId {
    s.parse().unwrap()
}

async fn ledger_with(invoice_id: &str) -> TestLedger {
    let ledger = CountingLedger::new(MemoryLedger::default());
    let invoice = NewInvoice::new(id(invoice_id), dec!(100.00), "USD").unwrap().with_email("buyer@example.com");
    ledger.inner().append(invoice).await.unwrap();
    ledger
}

fn gateway_offline() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_authoritative_status().returning(|_| Err(UpstreamError::NotConfigured));
    gateway
}

fn price_feed() -> MockPriceFeed {
    let mut feed = MockPriceFeed::new();
    feed.expect_name().returning(|| "mock".to_string());
    feed.expect_fetch_spot_price().returning(|| Ok(dec!(0.082)));
    feed
}

fn untouched_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_authoritative_status().never();
    gateway
}

fn silent_mailer() -> MockMailer {
    let mut mailer = MockMailer::new();
    mailer.expect_send().never();
    mailer
}

#[actix_web::test]
async fn health() {
    let _ = env_logger::try_init().ok();
    let api = test_api(CountingLedger::new(MemoryLedger::default()), untouched_gateway(), silent_mailer(), price_feed());
    let req = actix_web::test::TestRequest::get().uri("/health");
    let (status, body) = send_request(req, api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn signed_webhook_settles_the_invoice() {
    let _ = env_logger::try_init().ok();
    let ledger = ledger_with("inv_A").await;
    let mut mailer = MockMailer::new();
    mailer
        .expect_send()
        .withf(|channel, _| matches!(channel, NotificationChannel::User))
        .times(1)
        .returning(|_, _| Ok(MessageId("msg-user".into())));
    mailer
        .expect_send()
        .withf(|channel, _| matches!(channel, NotificationChannel::Admin))
        .times(1)
        .returning(|_, _| Ok(MessageId("msg-admin".into())));
    let api = test_api(ledger.clone(), gateway_offline(), mailer, price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_A"}}"#;
    let (status, body) = send_request(signed_webhook(body), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response = serde_json::from_str::<WebhookResponse>(&body).unwrap();
    assert!(response.success);
    assert_eq!(response.status, "SUCCESS");
    assert_eq!(ledger.settlements(), 1);
    let record = ledger.inner().find(&id("inv_A")).await.unwrap().unwrap();
    assert_eq!(record.status, InvoiceStatus::Success);
    assert_eq!(record.token_price, Some(dec!(0.082)));
    assert_eq!(record.tokens_purchased, Some(dec!(1219.512195)));
    assert!(record.email_sent_user);
    assert!(record.email_sent_admin);
}

#[actix_web::test]
async fn invalid_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let ledger = ledger_with("inv_A").await;
    let api = test_api(ledger.clone(), untouched_gateway(), silent_mailer(), price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_A"}}"#;
    let req = unsigned_webhook(body).insert_header(("X-Gateway-Signature", "00".repeat(32)));
    let err = send_request(req, api, false).await.expect_err("Expected error");
    assert_eq!(err, "Invalid webhook signature.");
    assert_eq!(ledger.writes(), 0);
}

#[actix_web::test]
async fn tampered_body_is_rejected() {
    let _ = env_logger::try_init().ok();
    let ledger = ledger_with("inv_A").await;
    let api = test_api(ledger.clone(), untouched_gateway(), silent_mailer(), price_feed());
    let signed = signed_webhook(r#"{"type":"INVOICE_PENDING","invoice":{"id":"inv_A"}}"#);
    let req = signed.set_payload(r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_A"}}"#);
    let err = send_request(req, api, true).await.expect_err("Expected error");
    assert_eq!(err, "Invalid webhook signature.");
    assert_eq!(ledger.writes(), 0);
}

#[actix_web::test]
async fn unsigned_webhook_is_rejected_by_default() {
    let _ = env_logger::try_init().ok();
    let api = test_api(ledger_with("inv_A").await, untouched_gateway(), silent_mailer(), price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_A"}}"#;
    let err = send_request(unsigned_webhook(body), api, false).await.expect_err("Expected error");
    assert_eq!(err, "No webhook signature found.");
}

#[actix_web::test]
async fn unsigned_webhook_metadata_is_ignored() {
    let _ = env_logger::try_init().ok();
    let ledger = CountingLedger::new(MemoryLedger::default());
    ledger.inner().append(NewInvoice::new(id("inv_U"), dec!(40), "USD").unwrap()).await.unwrap();
    // No customer email on file, so only the admin is told.
    let mut mailer = MockMailer::new();
    mailer
        .expect_send()
        .withf(|channel, _| matches!(channel, NotificationChannel::Admin))
        .times(1)
        .returning(|_, _| Ok(MessageId("msg-admin".into())));
    let api = test_api(ledger.clone(), gateway_offline(), mailer, price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_U"},"customer":{"email":"mallory@example.com"}}"#;
    let (status, _) = send_request(unsigned_webhook(body), api, true).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let record = ledger.inner().find(&id("inv_U")).await.unwrap().unwrap();
    assert_eq!(record.status, InvoiceStatus::Success);
    assert_eq!(record.email, None);
    assert!(!record.email_sent_user);
    assert!(record.email_sent_admin);
}

#[actix_web::test]
async fn webhook_without_invoice_key() {
    let _ = env_logger::try_init().ok();
    let api = test_api(CountingLedger::new(MemoryLedger::default()), untouched_gateway(), silent_mailer(), price_feed());
    let (status, body) =
        send_request(signed_webhook(r#"{"type":"INVOICE_PAID"}"#), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = serde_json::from_str::<Value>(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("The request does not identify an invoice."));
}

#[actix_web::test]
async fn webhook_body_is_not_json() {
    let _ = env_logger::try_init().ok();
    let api = test_api(CountingLedger::new(MemoryLedger::default()), untouched_gateway(), silent_mailer(), price_feed());
    let (status, _) = send_request(signed_webhook("INVOICE_PAID inv_A"), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn ledger_outage_asks_for_redelivery() {
    let _ = env_logger::try_init().ok();
    let ledger = ledger_with("inv_A").await;
    ledger.fail_reads(true);
    let api = test_api(ledger.clone(), untouched_gateway(), silent_mailer(), price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_A"}}"#;
    let (status, _) = send_request(signed_webhook(body), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ledger.settlements(), 0);
}

#[actix_web::test]
async fn gateway_poll_beats_the_payload() {
    let _ = env_logger::try_init().ok();
    let ledger = ledger_with("inv_G").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_authoritative_status()
        .times(1)
        .returning(|_| Ok(GatewayStatus { raw_status: Some("PENDING".into()), metadata: Value::Null }));
    let api = test_api(ledger.clone(), gateway, silent_mailer(), price_feed());
    let body = r#"{"type":"INVOICE_PAID","invoice":{"id":"inv_G"}}"#;
    let (status, body) = send_request(signed_webhook(body), api, false).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response = serde_json::from_str::<WebhookResponse>(&body).unwrap();
    assert_eq!(response.status, "CREATED");
    assert_eq!(ledger.writes(), 0);
}
