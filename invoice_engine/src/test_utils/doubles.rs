//! Scripted stand-ins for the engine's collaborators. Each one is cheap to clone and clones share their state, so a
//! test can hand one copy to the engine and keep another to inspect.
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::{
    db_types::{EmailChannel, InvoiceId, InvoiceRecord, InvoiceUpdate, NewInvoice},
    escalation::Escalation,
    invoice_objects::ResolvedView,
    traits::{
        GatewayPoll,
        GatewayStatus,
        LedgerError,
        LedgerStore,
        MessageId,
        NotificationChannel,
        NotificationError,
        Notifier,
        PriceError,
        PriceSource,
        UpstreamError,
    },
};

//--------------------------------------  ScriptedGateway    ---------------------------------------------------------
/// A gateway that replays queued responses, then repeats a fallback response forever.
#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    queue: Arc<Mutex<VecDeque<Result<GatewayStatus, UpstreamError>>>>,
    fallback: Arc<Mutex<Result<GatewayStatus, UpstreamError>>>,
    calls: Arc<AtomicUsize>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::always(Err(UpstreamError::NotConfigured))
    }
}

impl ScriptedGateway {
    pub fn always(response: Result<GatewayStatus, UpstreamError>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(response)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A gateway that answers every poll with `raw_status` and the given metadata.
    pub fn reporting(raw_status: &str, metadata: Value) -> Self {
        Self::always(Ok(Self::status(raw_status, metadata)))
    }

    /// A gateway that answers every poll with an HTTP error.
    pub fn failing(status: u16) -> Self {
        Self::always(Err(UpstreamError::Status { status, message: "scripted failure".into() }))
    }

    pub fn status(raw_status: &str, metadata: Value) -> GatewayStatus {
        let mut body = metadata;
        if body.is_null() {
            body = json!({});
        }
        GatewayStatus { raw_status: Some(raw_status.to_string()), metadata: body }
    }

    pub fn push(&self, response: Result<GatewayStatus, UpstreamError>) {
        self.queue.lock().expect("gateway script poisoned").push_back(response);
    }

    pub fn set_fallback(&self, response: Result<GatewayStatus, UpstreamError>) {
        *self.fallback.lock().expect("gateway script poisoned") = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GatewayPoll for ScriptedGateway {
    async fn authoritative_status(&self, _invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queue.lock().expect("gateway script poisoned").pop_front();
        match queued {
            Some(response) => response,
            None => self.fallback.lock().expect("gateway script poisoned").clone(),
        }
    }
}

//-------------------------------------- RecordingNotifier   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: NotificationChannel,
    pub invoice_id: InvoiceId,
    pub message_id: MessageId,
}

/// A notifier that records what it sends. Channels can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<Mutex<HashSet<EmailChannel>>>,
    fail_escalations: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn fail_channel(&self, channel: EmailChannel) {
        self.failing.lock().expect("notifier poisoned").insert(channel);
    }

    pub fn fail_escalations(&self, fail: bool) {
        self.fail_escalations.store(fail, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.lock().expect("notifier poisoned").clear();
        self.fail_escalations.store(false, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("notifier poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("notifier poisoned").len()
    }

    /// Number of confirmed sends on an email channel.
    pub fn emails_sent(&self, channel: EmailChannel) -> usize {
        let wanted = match channel {
            EmailChannel::User => NotificationChannel::User,
            EmailChannel::Admin => NotificationChannel::Admin,
        };
        self.sent().iter().filter(|m| m.channel == wanted).count()
    }

    pub fn escalations(&self) -> Vec<Escalation> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m.channel {
                NotificationChannel::Escalation(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Every call to `send`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &NotificationChannel, invoice: &ResolvedView) -> Result<MessageId, NotificationError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        let fails = match channel {
            NotificationChannel::User => self.failing.lock().expect("notifier poisoned").contains(&EmailChannel::User),
            NotificationChannel::Admin => self.failing.lock().expect("notifier poisoned").contains(&EmailChannel::Admin),
            NotificationChannel::Escalation(_) => self.fail_escalations.load(Ordering::SeqCst),
        };
        if fails {
            return Err(NotificationError::Transport(format!("scripted {channel} failure")));
        }
        let message_id = MessageId(format!("msg-{n}"));
        let message = SentMessage { channel: channel.clone(), invoice_id: invoice.invoice_id.clone(), message_id };
        self.sent.lock().expect("notifier poisoned").push(message.clone());
        Ok(message.message_id)
    }
}

//-------------------------------------- FixedPriceSource    ---------------------------------------------------------
/// A price feed that always returns the same answer.
#[derive(Debug, Clone)]
pub struct FixedPriceSource {
    name: String,
    price: Option<Decimal>,
    calls: Arc<AtomicUsize>,
}

impl FixedPriceSource {
    pub fn new(price: Decimal) -> Self {
        Self { name: "fixed".into(), price: Some(price), calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn offline(name: &str) -> Self {
        Self { name: name.into(), price: None, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceSource for FixedPriceSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn fetch_spot_price(&self) -> Result<Decimal, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.price.ok_or_else(|| PriceError::Unavailable(format!("{} is offline", self.name)))
    }
}

//--------------------------------------   CountingLedger    ---------------------------------------------------------
/// Wraps another ledger, counting writes and optionally failing reads or writes.
#[derive(Debug, Clone)]
pub struct CountingLedger<B> {
    inner: B,
    settlements: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl<B> CountingLedger<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            settlements: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Status changes that were actually applied.
    pub fn settlements(&self) -> usize {
        self.settlements.load(Ordering::SeqCst)
    }

    /// Applied updates of any kind, including inserts.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<B: LedgerStore> LedgerStore for CountingLedger<B> {
    async fn find(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceRecord>, LedgerError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LedgerError::DatabaseError("scripted read failure".into()));
        }
        self.inner.find(invoice_id).await
    }

    async fn append(&self, invoice: NewInvoice) -> Result<(InvoiceRecord, bool), LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::DatabaseError("scripted write failure".into()));
        }
        let result = self.inner.append(invoice).await?;
        if result.1 {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result)
    }

    async fn update_fields(
        &self,
        invoice_id: &InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Option<InvoiceRecord>, LedgerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::DatabaseError("scripted write failure".into()));
        }
        let is_settlement = update.status.is_some();
        let result = self.inner.update_fields(invoice_id, update).await?;
        if result.is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if is_settlement {
                self.settlements.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(result)
    }
}
