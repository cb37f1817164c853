use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{InvoiceId, InvoiceRecord, InvoiceStatus, InvoiceUpdate, NewInvoice},
    errors::ReconcileError,
    escalation::{Escalation, EscalationMonitor},
    helpers::{normalize_status, RetryPolicy},
    invoice_objects::{
        InvoiceMetadata,
        ReconcileOutcome,
        Reconciliation,
        ResolvedView,
        SignalOrigin,
        SignalSource,
        WebhookPayload,
    },
    ledger_api::{InvoiceLedger, SettleOutcome},
    notification_gate::NotificationGate,
    price_oracle::PriceOracle,
    token_calculator::{quote, TokenQuote},
    traits::{GatewayPoll, GatewayStatus, LedgerStore, Notifier, PriceSource, UpstreamError},
};

/// Tuning knobs for [`ReconciliationApi`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub stuck_after: Duration,
    pub user_email_grace: Duration,
    /// When set, a sent alert is recorded and further alerts for the invoice are held back for this long.
    pub escalation_cooldown: Option<Duration>,
    pub gateway_retry: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            stuck_after: Duration::minutes(10),
            user_email_grace: Duration::minutes(5),
            escalation_cooldown: None,
            gateway_retry: RetryPolicy::default(),
        }
    }
}

/// The status a reconciliation pass will act on, and where it came from.
#[derive(Debug, Clone)]
struct ResolvedSignal {
    status: InvoiceStatus,
    origin: SignalOrigin,
    metadata: InvoiceMetadata,
}

/// `ReconciliationApi` turns webhook deliveries and status checks into a single, monotonic invoice record.
///
/// Every call follows the same steps:
/// 1. Read the stored invoice. An unknown invoice is treated as a fresh `CREATED` one.
/// 2. A settled invoice is never re-polled or re-settled. Only its outstanding side effects (a missing token quote,
///    unsent confirmation emails) are retried.
/// 3. Otherwise the gateway is polled. A successful poll beats the webhook payload, which beats the stored status.
/// 4. An open status changes nothing. A terminal status is written with a guarded update, so when several handlers
///    race only one of them settles the invoice.
/// 5. A successful settlement freezes the token quote and triggers the confirmation emails.
/// 6. Finally the escalation monitor has a look.
///
/// Nothing is locked in-process. Handlers for the same invoice can run concurrently and the ledger's guarded writes
/// decide the winner.
pub struct ReconciliationApi<B, G, N, S> {
    ledger: InvoiceLedger<B>,
    gateway: G,
    gate: NotificationGate<B, N>,
    oracle: PriceOracle<S>,
    monitor: EscalationMonitor,
    retry: RetryPolicy,
}

impl<B, G, N, S> Debug for ReconciliationApi<B, G, N, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B: Clone, G, N, S> ReconciliationApi<B, G, N, S> {
    pub fn new(db: B, gateway: G, notifier: N, oracle: PriceOracle<S>, options: EngineOptions) -> Self {
        let ledger = InvoiceLedger::new(db);
        let gate = NotificationGate::new(ledger.clone(), notifier);
        let monitor = EscalationMonitor::new(options.stuck_after, options.user_email_grace, options.escalation_cooldown);
        Self { ledger, gateway, gate, oracle, monitor, retry: options.gateway_retry }
    }

    pub fn ledger(&self) -> &InvoiceLedger<B> {
        &self.ledger
    }

    pub fn monitor(&self) -> &EscalationMonitor {
        &self.monitor
    }
}

impl<B, G, N, S> ReconciliationApi<B, G, N, S>
where
    B: LedgerStore,
    G: GatewayPoll,
    N: Notifier,
    S: PriceSource,
{
    /// Reconciles an invoice and returns the resolved view. Both the webhook and the status-check entry points use
    /// this.
    pub async fn reconcile(
        &self,
        invoice_id: &InvoiceId,
        source: SignalSource,
        webhook: Option<WebhookPayload>,
    ) -> Result<ResolvedView, ReconcileError> {
        self.reconcile_with_outcome(invoice_id, source, webhook).await.map(|r| r.view)
    }

    /// Like [`Self::reconcile`], but also reports what was decided and whether an alert was raised.
    ///
    /// The only error is an unreadable ledger. Every other failure (gateway, price feed, mailer, a failed write)
    /// degrades to a best-effort view.
    pub async fn reconcile_with_outcome(
        &self,
        invoice_id: &InvoiceId,
        source: SignalSource,
        webhook: Option<WebhookPayload>,
    ) -> Result<Reconciliation, ReconcileError> {
        let now = Utc::now();
        trace!("🧾️ Reconciling invoice {invoice_id} ({source})");
        let stored = self.ledger.find(invoice_id).await.map_err(|e| {
            error!("🧾️ Cannot reconcile invoice {invoice_id}. The ledger could not be read. {e}");
            ReconcileError::LedgerUnavailable(e)
        })?;
        let exists = stored.is_some();
        let mut record = stored.unwrap_or_else(|| {
            warn!("🧾️ Invoice {invoice_id} is not in the ledger. Treating it as a new invoice.");
            InvoiceRecord::placeholder(invoice_id.clone(), now)
        });
        let outcome = if record.status.is_terminal() {
            self.complete_settlement(&mut record).await;
            ReconcileOutcome::AlreadyTerminal
        } else {
            let signal = self.resolve_signal(&record, webhook.as_ref()).await;
            self.apply_signal(&mut record, exists, signal, now).await
        };
        let escalation = self.escalate_if_needed(&mut record, now).await;
        let view = ResolvedView::new(&record, self.monitor.display_status(&record, now));
        info!("🧾️ Invoice {invoice_id} ({source}): {outcome}. Reporting {}", view.display_status);
        Ok(Reconciliation { view, outcome, escalation })
    }

    async fn resolve_signal(&self, record: &InvoiceRecord, webhook: Option<&WebhookPayload>) -> ResolvedSignal {
        let invoice_id = &record.invoice_id;
        let webhook_metadata = webhook.map(WebhookPayload::trusted_metadata).unwrap_or_default();
        // A poll that answers without a status carries no news, but its metadata is still trusted.
        let gateway_metadata = match self.poll_gateway(invoice_id).await {
            Ok(polled) => match polled.raw_status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => {
                    let status = normalize_status(Some(raw));
                    debug!("🧾️ The gateway reports {status} for invoice {invoice_id}");
                    let metadata = InvoiceMetadata::from_value(&polled.metadata).or(webhook_metadata);
                    return ResolvedSignal { status, origin: SignalOrigin::Gateway, metadata };
                },
                None => {
                    debug!("🧾️ The gateway answered for invoice {invoice_id} without a status");
                    InvoiceMetadata::from_value(&polled.metadata)
                },
            },
            Err(_) => InvoiceMetadata::default(),
        };
        match webhook {
            Some(payload) => {
                let status = normalize_status(payload.raw_status().as_deref());
                debug!("🧾️ Using the webhook payload for invoice {invoice_id}, which reports {status}");
                ResolvedSignal { status, origin: SignalOrigin::Webhook, metadata: gateway_metadata.or(webhook_metadata) }
            },
            None => {
                debug!("🧾️ No new information for invoice {invoice_id}. Keeping {}", record.status);
                ResolvedSignal { status: record.status, origin: SignalOrigin::Ledger, metadata: gateway_metadata }
            },
        }
    }

    async fn poll_gateway(&self, invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError> {
        let label = format!("Status poll for invoice {invoice_id}");
        let result =
            self.retry.run(&label, UpstreamError::is_retryable, || self.gateway.authoritative_status(invoice_id)).await;
        match &result {
            Err(UpstreamError::NotConfigured) => trace!("🛰️ No gateway to poll for invoice {invoice_id}"),
            Err(e) => warn!("🛰️ Could not poll the gateway for invoice {invoice_id}. Falling back. {e}"),
            Ok(_) => {},
        }
        result
    }

    async fn apply_signal(
        &self,
        record: &mut InvoiceRecord,
        exists: bool,
        signal: ResolvedSignal,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let ResolvedSignal { status, origin, metadata } = signal;
        if status.is_open() {
            return ReconcileOutcome::NoChange { origin };
        }
        let invoice_id = record.invoice_id.clone();
        if !exists {
            match self.ledger.open_invoice(invoice_from_metadata(&invoice_id, &metadata, now)).await {
                Ok((stored, _)) => *record = stored,
                Err(e) => warn!("🧾️ Could not add invoice {invoice_id} to the ledger. {e}"),
            }
        }
        let from = record.status;
        let update = match status {
            InvoiceStatus::Success => self.success_update(record, &metadata).await,
            _ => InvoiceUpdate::transition(status),
        };
        match self.ledger.settle(&invoice_id, update.clone()).await {
            Ok(SettleOutcome::Applied(stored)) => {
                *record = stored;
                if record.status == InvoiceStatus::Success {
                    self.gate.fire_confirmations(record).await;
                }
                ReconcileOutcome::Transitioned { from, to: status, origin }
            },
            Ok(SettleOutcome::Superseded(stored)) => {
                *record = stored;
                self.complete_settlement(record).await;
                ReconcileOutcome::Superseded { winner: record.status }
            },
            Ok(SettleOutcome::Missing) => {
                error!("🧾️ Invoice {invoice_id} disappeared from the ledger before it could be settled as {status}");
                apply_in_memory(record, &update, now);
                ReconcileOutcome::Unpersisted { to: status, origin }
            },
            Err(e) => {
                error!("🧾️ Could not settle invoice {invoice_id} as {status}. The next reconciliation will retry. {e}");
                apply_in_memory(record, &update, now);
                ReconcileOutcome::Unpersisted { to: status, origin }
            },
        }
    }

    /// The settlement write for a successful payment: the status, a token quote unless one is already stored, and
    /// any customer details that are still missing.
    async fn success_update(&self, record: &InvoiceRecord, metadata: &InvoiceMetadata) -> InvoiceUpdate {
        let mut update = InvoiceUpdate::transition(InvoiceStatus::Success);
        if !record.has_token_quote() {
            if let Some(q) = self.quote_tokens(record).await {
                update = update.with_tokens(q.token_price, q.tokens_purchased);
            }
        }
        if let (None, Some(email)) = (record.customer_email(), &metadata.email) {
            update = update.with_email(email.clone());
        }
        if let (true, Some(name)) = (is_blank(&record.name), &metadata.name) {
            update = update.with_name(name.clone());
        }
        if record.wallet.is_none() {
            if let Some(wallet) = metadata.wallet() {
                update = update.with_wallet(wallet);
            }
        }
        update
    }

    async fn quote_tokens(&self, record: &InvoiceRecord) -> Option<TokenQuote> {
        let invoice_id = &record.invoice_id;
        let Some(amount) = record.amount else {
            warn!("🧾️ Invoice {invoice_id} has no amount, so no tokens can be calculated");
            return None;
        };
        let Some(spot) = self.oracle.spot_price().await else {
            warn!("🧾️ No spot price for invoice {invoice_id}. Tokens will be calculated on a later reconciliation.");
            return None;
        };
        let result = quote(amount, spot.price);
        match &result {
            Some(q) => debug!(
                "🧾️ Invoice {invoice_id}: {amount} at {} ({}) buys {} tokens",
                q.token_price, spot.source, q.tokens_purchased
            ),
            None => warn!("🧾️ Could not calculate tokens for invoice {invoice_id} from {amount} at {}", spot.price),
        }
        result
    }

    /// Finishes the side effects of a settled invoice that an earlier call could not complete.
    async fn complete_settlement(&self, record: &mut InvoiceRecord) {
        if record.status != InvoiceStatus::Success {
            return;
        }
        if !record.has_token_quote() {
            if let Some(q) = self.quote_tokens(record).await {
                match self.ledger.backfill_tokens(&record.invoice_id, q).await {
                    Ok(Some(stored)) => {
                        record.token_price = stored.token_price;
                        record.tokens_purchased = stored.tokens_purchased;
                    },
                    Ok(None) => warn!("🧾️ Invoice {} vanished while storing its token quote", record.invoice_id),
                    Err(e) => warn!("🧾️ Could not store the token quote for invoice {}. {e}", record.invoice_id),
                }
            }
        }
        if !(record.email_sent_user && record.email_sent_admin) {
            self.gate.fire_confirmations(record).await;
        }
    }

    async fn escalate_if_needed(&self, record: &mut InvoiceRecord, now: DateTime<Utc>) -> Option<Escalation> {
        let escalation = self.monitor.assess(record, now)?;
        let invoice_id = &record.invoice_id;
        if self.monitor.is_suppressed(record, now) {
            debug!("🚨️ Invoice {invoice_id} still needs attention ({}), but an alert was sent recently", escalation.kind);
            return None;
        }
        warn!(
            "🚨️ Invoice {invoice_id} needs attention: {} after {} minutes in {}",
            escalation.kind, escalation.age_minutes, escalation.status
        );
        let view = ResolvedView::new(record, self.monitor.display_status(record, now));
        match self.gate.send_escalation(&escalation, &view).await {
            Ok(message_id) => {
                info!("🚨️ Alert for invoice {invoice_id} sent. Message id: {message_id}");
                if self.monitor.cooldown.is_some() {
                    match self.ledger.mark_escalated(invoice_id, now).await {
                        Ok(Some(stored)) => record.escalated_at = stored.escalated_at,
                        Ok(None) => debug!("🚨️ Invoice {invoice_id} is not stored, so the alert time was not recorded"),
                        Err(e) => warn!("🚨️ Could not record the alert time for invoice {invoice_id}. {e}"),
                    }
                }
            },
            Err(e) => error!("🚨️ Could not send the alert for invoice {invoice_id}. {e}"),
        }
        Some(escalation)
    }
}

fn invoice_from_metadata(invoice_id: &InvoiceId, metadata: &InvoiceMetadata, now: DateTime<Utc>) -> NewInvoice {
    let mut invoice = NewInvoice::bare(invoice_id.clone(), now);
    invoice.amount = metadata.amount;
    invoice.currency = metadata.currency.clone();
    invoice.email = metadata.email.clone();
    invoice.name = metadata.name.clone();
    invoice.wallet = metadata.wallet();
    invoice
}

fn apply_in_memory(record: &mut InvoiceRecord, update: &InvoiceUpdate, now: DateTime<Utc>) {
    if let Some(computed) = update.apply_to(record, now) {
        *record = computed;
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}
