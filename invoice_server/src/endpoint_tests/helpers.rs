use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use chrono::Duration;
use invoice_engine::{
    helpers::RetryPolicy,
    test_utils::{CountingLedger, MemoryLedger},
    EngineOptions,
    PriceOracle,
    ReconciliationApi,
};
use ipg_common::Secret;
use log::debug;

use super::mocks::{MockGateway, MockMailer, MockPriceFeed};
use crate::{
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    routes::{health, CreateInvoiceRoute, InvoiceStatusRoute, WebhookRoute},
};

// DO NOT re-use this secret anywhere.
pub const WEBHOOK_SECRET: &str = "whsec_3b1f0c9a7e5d4c2b";
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

pub type TestLedger = CountingLedger<MemoryLedger>;
pub type TestApi = ReconciliationApi<TestLedger, MockGateway, MockMailer, MockPriceFeed>;

pub fn test_api(ledger: TestLedger, gateway: MockGateway, mailer: MockMailer, feed: MockPriceFeed) -> TestApi {
    let oracle = PriceOracle::new(vec![feed], Duration::seconds(60));
    let options = EngineOptions { gateway_retry: RetryPolicy::immediate(3), ..EngineOptions::default() };
    ReconciliationApi::new(ledger, gateway, mailer, oracle, options)
}

pub fn signed_webhook(body: &str) -> TestRequest {
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    unsigned_webhook(body).insert_header((SIGNATURE_HEADER, signature))
}

pub fn unsigned_webhook(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string())
}

/// Sends `req` to an app with every route mounted the same way the server mounts them. Errors raised by middleware
/// come back as `Err` with the error text.
pub async fn send_request(req: TestRequest, api: TestApi, allow_unsigned: bool) -> Result<(StatusCode, String), String> {
    let hmac = HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string()), allow_unsigned);
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(health)
        .service(
            web::scope("/webhook")
                .wrap(hmac)
                .service(WebhookRoute::<TestLedger, MockGateway, MockMailer, MockPriceFeed>::new()),
        )
        .service(InvoiceStatusRoute::<TestLedger, MockGateway, MockMailer, MockPriceFeed>::new())
        .service(CreateInvoiceRoute::<TestLedger, MockGateway, MockMailer, MockPriceFeed>::new());
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
