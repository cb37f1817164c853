use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::{validate_currency, InvoiceId, InvoiceRecord, InvoiceStatus, WalletAddress, WalletNetwork},
    escalation::Escalation,
    helpers::{
        first_match,
        AMOUNT_EXTRACTORS,
        CURRENCY_EXTRACTORS,
        EMAIL_EXTRACTORS,
        INVOICE_KEY_EXTRACTORS,
        NAME_EXTRACTORS,
        STATUS_EXTRACTORS,
        WALLET_EXTRACTORS,
    },
};

//--------------------------------------    SignalSource     ---------------------------------------------------------
/// Which entry point asked for the reconciliation. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSource {
    Webhook,
    StatusCheck,
    Manual,
}

impl Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => f.write_str("WEBHOOK"),
            Self::StatusCheck => f.write_str("STATUS_CHECK"),
            Self::Manual => f.write_str("MANUAL"),
        }
    }
}

//--------------------------------------    SignalOrigin     ---------------------------------------------------------
/// Where the status that reconciliation acted on came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalOrigin {
    /// A successful status poll.
    Gateway,
    /// The webhook payload supplied with the call.
    Webhook,
    /// No new information. The persisted status stands.
    Ledger,
}

impl Display for SignalOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway => f.write_str("gateway poll"),
            Self::Webhook => f.write_str("webhook"),
            Self::Ledger => f.write_str("ledger"),
        }
    }
}

//--------------------------------------   WebhookPayload    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub body: Value,
    /// True if the payload's signature was checked. Customer details from unverified payloads are never stored.
    pub verified: bool,
}

impl WebhookPayload {
    pub fn new(body: Value, verified: bool) -> Self {
        Self { body, verified }
    }

    /// The raw invoice key, if the payload carries one anywhere we know to look.
    pub fn invoice_key(&self) -> Option<String> {
        first_match(INVOICE_KEY_EXTRACTORS, &self.body)
    }

    pub fn invoice_id(&self) -> Option<Result<InvoiceId, crate::db_types::ValidationError>> {
        self.invoice_key().map(|k| InvoiceId::from_str(&k))
    }

    pub fn raw_status(&self) -> Option<String> {
        first_match(STATUS_EXTRACTORS, &self.body)
    }

    /// Customer details from the payload, or nothing if the payload was not verified.
    pub fn trusted_metadata(&self) -> InvoiceMetadata {
        if self.verified {
            InvoiceMetadata::from_value(&self.body)
        } else {
            InvoiceMetadata::default()
        }
    }
}

//--------------------------------------  InvoiceMetadata    ---------------------------------------------------------
/// Customer and pricing details pulled out of a gateway response or webhook body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceMetadata {
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet_address: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

impl InvoiceMetadata {
    pub fn from_value(value: &Value) -> Self {
        let amount = first_match(AMOUNT_EXTRACTORS, value).and_then(|a| match Decimal::from_str(&a) {
            Ok(d) if d > Decimal::ZERO => Some(d),
            _ => {
                warn!("🧾️ Ignoring unusable amount '{a}' in invoice metadata");
                None
            },
        });
        let currency = first_match(CURRENCY_EXTRACTORS, value).and_then(|c| match validate_currency(&c) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("🧾️ Ignoring currency in invoice metadata. {e}");
                None
            },
        });
        Self {
            email: first_match(EMAIL_EXTRACTORS, value),
            name: first_match(NAME_EXTRACTORS, value),
            wallet_address: first_match(WALLET_EXTRACTORS, value),
            amount,
            currency,
        }
    }

    /// Field-by-field merge, preferring values from `self`.
    pub fn or(self, other: InvoiceMetadata) -> Self {
        Self {
            email: self.email.or(other.email),
            name: self.name.or(other.name),
            wallet_address: self.wallet_address.or(other.wallet_address),
            amount: self.amount.or(other.amount),
            currency: self.currency.or(other.currency),
        }
    }

    /// The wallet address, if present and valid. Invalid addresses are logged and dropped.
    pub fn wallet(&self) -> Option<WalletAddress> {
        let address = self.wallet_address.as_deref()?;
        match WalletAddress::from_str(address) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("🧾️ Ignoring wallet address in invoice metadata. {e}");
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

//--------------------------------------    ResolvedView     ---------------------------------------------------------
/// What a caller gets back from reconciliation. It only carries persisted state (plus the display label), so two
/// calls that change nothing produce identical views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedView {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub display_status: String,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub token_price: Option<Decimal>,
    pub tokens_purchased: Option<Decimal>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_network: Option<WalletNetwork>,
    pub email_sent_user: bool,
    pub email_sent_admin: bool,
    pub created_at: DateTime<Utc>,
    pub email_sent_at: Option<DateTime<Utc>>,
}

impl ResolvedView {
    pub fn new(record: &InvoiceRecord, display_status: String) -> Self {
        Self {
            invoice_id: record.invoice_id.clone(),
            status: record.status,
            display_status,
            amount: record.amount,
            currency: record.currency.clone(),
            token_price: record.token_price,
            tokens_purchased: record.tokens_purchased,
            email: record.email.clone(),
            name: record.name.clone(),
            wallet_address: record.wallet.as_ref().map(|w| w.address().to_string()),
            wallet_network: record.wallet.as_ref().map(|w| w.network()),
            email_sent_user: record.email_sent_user,
            email_sent_admin: record.email_sent_admin,
            created_at: record.created_at,
            email_sent_at: record.email_sent_at,
        }
    }
}

impl From<&InvoiceRecord> for ResolvedView {
    fn from(record: &InvoiceRecord) -> Self {
        Self::new(record, record.status.to_string())
    }
}

//--------------------------------------  ReconcileOutcome   ---------------------------------------------------------
/// What reconciliation decided, for callers that want to log or count it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The invoice was already settled. Nothing was polled.
    AlreadyTerminal,
    /// Nothing to persist. `origin` says where the (open) status came from.
    NoChange { origin: SignalOrigin },
    /// This call settled the invoice.
    Transitioned { from: InvoiceStatus, to: InvoiceStatus, origin: SignalOrigin },
    /// A concurrent call settled the invoice first. The view reflects the winner.
    Superseded { winner: InvoiceStatus },
    /// The settlement could not be written. The view shows what would have been stored; the next call retries.
    Unpersisted { to: InvoiceStatus, origin: SignalOrigin },
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyTerminal => f.write_str("already settled"),
            Self::NoChange { origin } => write!(f, "no change (from {origin})"),
            Self::Transitioned { from, to, origin } => write!(f, "{from} -> {to} (from {origin})"),
            Self::Superseded { winner } => write!(f, "superseded by a concurrent {winner}"),
            Self::Unpersisted { to, origin } => write!(f, "{to} not persisted (from {origin})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub view: ResolvedView,
    pub outcome: ReconcileOutcome,
    pub escalation: Option<Escalation>,
}
