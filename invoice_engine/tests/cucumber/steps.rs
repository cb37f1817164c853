use std::str::FromStr;

use chrono::{Duration, Utc};
use cucumber::{given, then, when};
use invoice_engine::{
    db_types::{EmailChannel, InvoiceId, InvoiceStatus, InvoiceUpdate, NewInvoice, WalletAddress},
    test_utils::ScriptedGateway,
    traits::{GatewayStatus, LedgerStore, UpstreamError},
    EscalationKind,
    ReconcileOutcome,
    SignalSource,
    WebhookPayload,
};
use log::*;
use rust_decimal::Decimal;
use serde_json::json;

use super::world::{InvoiceWorld, ReconciliationSystem};

fn invoice_id(s: &str) -> InvoiceId {
    InvoiceId::from_str(s).expect("Invalid invoice id in feature file")
}

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).expect("Invalid decimal in feature file")
}

fn channel(s: &str) -> EmailChannel {
    match s {
        "user" => EmailChannel::User,
        "admin" => EmailChannel::Admin,
        _ => panic!("Unknown email channel: {s}"),
    }
}

//--------------------------------------       Given         ---------------------------------------------------------

#[given("a fresh invoice ledger")]
async fn fresh_ledger(world: &mut InvoiceWorld) {
    world.system = Some(ReconciliationSystem::new().await);
    world.results.clear();
    world.last_error = None;
}

#[given(expr = "the spot price is {word}")]
async fn spot_price(world: &mut InvoiceWorld, price: String) {
    world.system_mut().spot_price = Some(decimal(&price));
}

#[given("the price feeds are offline")]
async fn price_feeds_offline(world: &mut InvoiceWorld) {
    world.system_mut().spot_price = None;
}

#[given(expr = "invoice {word} for {word} {word} was created {int} minute(s) ago")]
async fn existing_invoice(world: &mut InvoiceWorld, id: String, amount: String, currency: String, minutes: i64) {
    let created_at = Utc::now() - Duration::minutes(minutes);
    let invoice =
        NewInvoice::new(invoice_id(&id), decimal(&amount), &currency).expect("Invalid invoice").with_created_at(created_at);
    let (_, inserted) = world.system().ledger.inner().append(invoice).await.expect("Error inserting invoice");
    assert!(inserted, "Invoice {id} was already in the ledger");
}

#[given(expr = "the customer for invoice {word} is {string}")]
async fn customer_email(world: &mut InvoiceWorld, id: String, email: String) {
    let update = InvoiceUpdate::default().with_email(email);
    let stored = world.system().ledger.inner().update_fields(&invoice_id(&id), update).await;
    assert!(matches!(stored, Ok(Some(_))), "Could not set the customer email for {id}");
}

#[given(expr = "invoice {word} was settled as SUCCESS with {word} tokens at {word}")]
async fn settled_invoice(world: &mut InvoiceWorld, id: String, tokens: String, price: String) {
    let update = InvoiceUpdate::transition(InvoiceStatus::Success).with_tokens(decimal(&price), decimal(&tokens));
    let stored = world.system().ledger.inner().update_fields(&invoice_id(&id), update).await;
    assert!(matches!(stored, Ok(Some(_))), "Could not settle {id}");
}

#[given(expr = "both confirmation emails for invoice {word} were sent")]
async fn confirmations_sent(world: &mut InvoiceWorld, id: String) {
    let db = world.system().ledger.inner();
    let id = invoice_id(&id);
    for channel in [EmailChannel::User, EmailChannel::Admin] {
        let stored = db.update_fields(&id, InvoiceUpdate::notified(channel, Utc::now())).await;
        assert!(matches!(stored, Ok(Some(_))), "Could not flag the {channel} email for {id}");
    }
}

#[given(expr = "the gateway reports {string}")]
async fn gateway_reports(world: &mut InvoiceWorld, raw_status: String) {
    world.system().gateway.set_fallback(Ok(ScriptedGateway::status(&raw_status, json!({}))));
}

#[given("the gateway answers every poll without a status")]
async fn gateway_without_status(world: &mut InvoiceWorld) {
    let polled = GatewayStatus { raw_status: None, metadata: json!({"invoice": {"state": "unknown"}}) };
    world.system().gateway.set_fallback(Ok(polled));
}

#[given(expr = "the gateway answers every poll with HTTP {int}")]
async fn gateway_fails(world: &mut InvoiceWorld, status: u16) {
    let error = UpstreamError::Status { status, message: "Internal Server Error".into() };
    world.system().gateway.set_fallback(Err(error));
}

//--------------------------------------        When         ---------------------------------------------------------

#[when(expr = "a verified webhook reports {string} for invoice {word}")]
async fn verified_webhook(world: &mut InvoiceWorld, raw_status: String, id: String) {
    let body = json!({ "invoice_id": id, "status": raw_status });
    reconcile(world, &id, SignalSource::Webhook, Some(WebhookPayload::new(body, true))).await;
}

#[when(expr = "the status of invoice {word} is checked")]
async fn status_check(world: &mut InvoiceWorld, id: String) {
    reconcile(world, &id, SignalSource::StatusCheck, None).await;
}

async fn reconcile(world: &mut InvoiceWorld, id: &str, source: SignalSource, webhook: Option<WebhookPayload>) {
    let api = world.system().api();
    match api.reconcile_with_outcome(&invoice_id(id), source, webhook).await {
        Ok(result) => {
            debug!("🚀️ Reconciled {id}: {}", result.outcome);
            world.results.push(result);
        },
        Err(e) => {
            warn!("🚀️ Reconciliation of {id} failed: {e}");
            world.last_error = Some(e.to_string());
        },
    }
}

#[when(expr = "invoice {word} is created for {word} {word} with wallet {string}")]
async fn create_with_wallet(world: &mut InvoiceWorld, id: String, amount: String, currency: String, wallet: String) {
    let invoice = WalletAddress::from_str(&wallet).and_then(|wallet| {
        NewInvoice::new(invoice_id(&id), decimal(&amount), &currency).map(|inv| inv.with_wallet(wallet))
    });
    match invoice {
        Ok(invoice) => {
            let api = world.system().api();
            api.ledger().open_invoice(invoice).await.expect("Error opening invoice");
        },
        Err(e) => {
            info!("🚀️ Invoice {id} was rejected: {e}");
            world.last_error = Some(e.to_string());
        },
    }
}

//--------------------------------------        Then         ---------------------------------------------------------

#[then(expr = "invoice {word} is stored as {word}")]
async fn stored_status(world: &mut InvoiceWorld, id: String, status: String) {
    let record = world.system().ledger.inner().find(&invoice_id(&id)).await.expect("Error reading invoice");
    let record = record.unwrap_or_else(|| panic!("Invoice {id} is not in the ledger"));
    assert_eq!(record.status.to_string(), status);
}

#[then(expr = "invoice {word} is not in the ledger")]
async fn not_stored(world: &mut InvoiceWorld, id: String) {
    let record = world.system().ledger.inner().find(&invoice_id(&id)).await.expect("Error reading invoice");
    assert!(record.is_none(), "Invoice {id} should not be in the ledger");
}

#[then(expr = "invoice {word} was credited with {word} tokens at a price of {word}")]
async fn credited_tokens(world: &mut InvoiceWorld, id: String, tokens: String, price: String) {
    let record = world.system().ledger.inner().find(&invoice_id(&id)).await.expect("Error reading invoice");
    let record = record.unwrap_or_else(|| panic!("Invoice {id} is not in the ledger"));
    assert_eq!(record.tokens_purchased, Some(decimal(&tokens)));
    assert_eq!(record.token_price, Some(decimal(&price)));
}

#[then(expr = "invoice {word} has no token quote")]
async fn no_token_quote(world: &mut InvoiceWorld, id: String) {
    let record = world.system().ledger.inner().find(&invoice_id(&id)).await.expect("Error reading invoice");
    let record = record.unwrap_or_else(|| panic!("Invoice {id} is not in the ledger"));
    assert!(!record.has_token_quote());
}

#[then(expr = "invoice {word} has an {word} wallet")]
async fn wallet_network(world: &mut InvoiceWorld, id: String, network: String) {
    let record = world.system().ledger.inner().find(&invoice_id(&id)).await.expect("Error reading invoice");
    let wallet = record.and_then(|r| r.wallet).unwrap_or_else(|| panic!("Invoice {id} has no wallet"));
    assert_eq!(wallet.network().to_string(), network);
}

#[then(expr = "the view reports status {word}")]
async fn view_status(world: &mut InvoiceWorld, status: String) {
    assert_eq!(world.last_result().view.status.to_string(), status);
}

#[then(expr = "the view displays {word}")]
async fn view_display(world: &mut InvoiceWorld, display: String) {
    assert_eq!(world.last_result().view.display_status, display);
}

#[then(expr = "reconciliation {int} {word} the invoice")]
async fn nth_outcome(world: &mut InvoiceWorld, n: usize, verb: String) {
    let result = world.results.get(n - 1).unwrap_or_else(|| panic!("There is no reconciliation #{n}"));
    let ok = match verb.as_str() {
        "settled" => matches!(result.outcome, ReconcileOutcome::Transitioned { .. }),
        "skipped" => matches!(result.outcome, ReconcileOutcome::AlreadyTerminal),
        "left" => matches!(result.outcome, ReconcileOutcome::NoChange { .. }),
        _ => panic!("Unknown outcome: {verb}"),
    };
    assert!(ok, "Reconciliation #{n} was {}", result.outcome);
}

#[then(expr = "the last {int} views are identical")]
async fn identical_views(world: &mut InvoiceWorld, n: usize) {
    assert!(world.results.len() >= n, "Only {} reconciliations happened", world.results.len());
    let views = world.results[world.results.len() - n..]
        .iter()
        .map(|r| serde_json::to_string(&r.view).expect("Error serializing view"))
        .collect::<Vec<_>>();
    assert!(views.windows(2).all(|w| w[0] == w[1]), "Views differ: {views:#?}");
}

#[then(expr = "there was exactly {int} settlement write(s)")]
async fn settlement_writes(world: &mut InvoiceWorld, n: usize) {
    assert_eq!(world.system().ledger.settlements(), n);
}

#[then(expr = "{int} {word} email(s) was/were sent")]
async fn emails_sent(world: &mut InvoiceWorld, n: usize, which: String) {
    assert_eq!(world.system().notifier.emails_sent(channel(&which)), n);
}

#[then("no email was sent")]
async fn no_email(world: &mut InvoiceWorld) {
    assert_eq!(world.system().notifier.sent_count(), 0);
}

#[then(expr = "the gateway was polled {int} time(s)")]
async fn gateway_polled(world: &mut InvoiceWorld, n: usize) {
    assert_eq!(world.system().gateway.calls(), n);
}

#[then("no alert was raised")]
async fn no_alert(world: &mut InvoiceWorld) {
    assert!(world.last_result().escalation.is_none());
    assert!(world.system().notifier.escalations().is_empty());
}

#[then(expr = "a {string} alert was raised for invoice {word}")]
async fn alert_raised(world: &mut InvoiceWorld, kind: String, id: String) {
    let kind = match kind.as_str() {
        "stuck invoice" => EscalationKind::StuckInvoice,
        "undelivered user email" => EscalationKind::UndeliveredUserEmail,
        _ => panic!("Unknown alert: {kind}"),
    };
    let escalation = world.last_result().escalation.clone().expect("No alert was raised");
    assert_eq!(escalation.kind, kind);
    assert_eq!(escalation.invoice_id.as_str(), id);
    let sent = world.system().notifier.escalations();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], escalation);
}

#[then("the request is rejected as invalid")]
async fn rejected(world: &mut InvoiceWorld) {
    let error = world.last_error.as_ref().expect("The request was not rejected");
    debug!("🚀️ Rejected with: {error}");
}
