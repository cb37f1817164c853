use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::helpers::detect_wallet_network;

//--------------------------------------  ValidationError    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid invoice key: {0}")]
    InvalidInvoiceKey(String),
    #[error("{0} is not a recognised wallet address")]
    InvalidWalletAddress(String),
    #[error("{0} matches more than one wallet network")]
    AmbiguousWalletAddress(String),
    #[error("Invoice amounts must be positive. Got {0}")]
    InvalidAmount(String),
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),
    #[error("Unknown value for {field}: {value}")]
    UnknownValue { field: &'static str, value: String },
}

//--------------------------------------     InvoiceId       ---------------------------------------------------------
/// The external identifier of an invoice. It is supplied by the gateway, so it is validated before it touches the
/// ledger: 1 to 128 characters drawn from `A-Z a-z 0-9 _ . : -`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceId(String);

pub const MAX_INVOICE_KEY_LENGTH: usize = 128;

impl InvoiceId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for InvoiceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if key.is_empty() {
            return Err(ValidationError::InvalidInvoiceKey("the key is empty".into()));
        }
        if key.len() > MAX_INVOICE_KEY_LENGTH {
            return Err(ValidationError::InvalidInvoiceKey(format!(
                "the key is {} characters long. The limit is {MAX_INVOICE_KEY_LENGTH}",
                key.len()
            )));
        }
        if let Some(c) = key.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))) {
            return Err(ValidationError::InvalidInvoiceKey(format!("'{c}' is not allowed in an invoice key")));
        }
        Ok(Self(key.to_string()))
    }
}

impl TryFrom<String> for InvoiceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceId> for String {
    fn from(value: InvoiceId) -> Self {
        value.0
    }
}

impl Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// The invoice exists but the gateway has not reported any payment activity.
    #[default]
    Created,
    /// The customer has started paying.
    Pending,
    /// A payment has been seen and is being confirmed.
    Processing,
    /// Paid in full. Terminal.
    Success,
    /// Cancelled, expired or refunded. Terminal.
    Failed,
    /// Settled for less than the invoiced amount. Terminal.
    Partial,
}

impl InvoiceStatus {
    pub const OPEN: [InvoiceStatus; 3] = [InvoiceStatus::Created, InvoiceStatus::Pending, InvoiceStatus::Processing];

    /// Terminal statuses are never overwritten.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Partial)
    }

    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Partial => "PARTIAL",
        }
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "PARTIAL" => Ok(Self::Partial),
            _ => Err(ValidationError::UnknownValue { field: "status", value: s.to_string() }),
        }
    }
}

//--------------------------------------   WalletNetwork     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletNetwork {
    Evm,
    Tron,
    Bitcoin,
    Solana,
}

impl Display for WalletNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Evm => "EVM",
            Self::Tron => "TRON",
            Self::Bitcoin => "BITCOIN",
            Self::Solana => "SOLANA",
        };
        f.write_str(s)
    }
}

impl FromStr for WalletNetwork {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EVM" => Ok(Self::Evm),
            "TRON" => Ok(Self::Tron),
            "BITCOIN" => Ok(Self::Bitcoin),
            "SOLANA" => Ok(Self::Solana),
            _ => Err(ValidationError::UnknownValue { field: "wallet network", value: s.to_string() }),
        }
    }
}

//--------------------------------------   WalletAddress     ---------------------------------------------------------
/// A payout address together with the network it was recognised as. Only addresses matching exactly one network are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress {
    address: String,
    network: WalletNetwork,
}

impl WalletAddress {
    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    pub fn network(&self) -> WalletNetwork {
        self.network
    }

    /// Rebuilds an address read back from storage. The address is re-checked so that a hand-edited row cannot smuggle
    /// in a mismatched network.
    pub fn from_parts(address: &str, network: &str) -> Result<Self, ValidationError> {
        let wallet = Self::from_str(address)?;
        let stored = WalletNetwork::from_str(network)?;
        if wallet.network != stored {
            return Err(ValidationError::InvalidWalletAddress(format!("{address} is not a {stored} address")));
        }
        Ok(wallet)
    }
}

impl FromStr for WalletAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = s.trim();
        let network = detect_wallet_network(address)?;
        Ok(Self { address: address.to_string(), network })
    }
}

impl Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.address, self.network)
    }
}

//--------------------------------------   EmailChannel      ---------------------------------------------------------
/// The two once-only confirmation emails sent for a settled invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailChannel {
    User,
    Admin,
}

impl Display for EmailChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

//--------------------------------------   InvoiceRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet: Option<WalletAddress>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub token_price: Option<Decimal>,
    pub tokens_purchased: Option<Decimal>,
    pub email_sent_user: bool,
    pub email_sent_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl InvoiceRecord {
    /// An in-memory stand-in for an invoice the ledger has never seen. It is not persisted.
    pub fn placeholder(invoice_id: InvoiceId, now: DateTime<Utc>) -> Self {
        Self {
            invoice_id,
            status: InvoiceStatus::Created,
            email: None,
            name: None,
            wallet: None,
            amount: None,
            currency: None,
            token_price: None,
            tokens_purchased: None,
            email_sent_user: false,
            email_sent_admin: false,
            created_at: now,
            updated_at: now,
            email_sent_at: None,
            escalated_at: None,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn has_token_quote(&self) -> bool {
        self.token_price.is_some() && self.tokens_purchased.is_some()
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn notified(&self, channel: EmailChannel) -> bool {
        match channel {
            EmailChannel::User => self.email_sent_user,
            EmailChannel::Admin => self.email_sent_admin,
        }
    }
}

//--------------------------------------     NewInvoice      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub invoice_id: InvoiceId,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet: Option<WalletAddress>,
    pub created_at: DateTime<Utc>,
}

impl NewInvoice {
    /// Creates a new invoice for a known amount. The amount must be positive and the currency a 3 to 5 letter code.
    pub fn new(invoice_id: InvoiceId, amount: Decimal, currency: &str) -> Result<Self, ValidationError> {
        let amount = validate_amount(amount)?;
        let currency = validate_currency(currency)?;
        Ok(Self {
            invoice_id,
            amount: Some(amount),
            currency: Some(currency),
            email: None,
            name: None,
            wallet: None,
            created_at: Utc::now(),
        })
    }

    /// An invoice row with nothing but its key. Used when a terminal signal arrives for an invoice the ledger never
    /// recorded.
    pub fn bare(invoice_id: InvoiceId, created_at: DateTime<Utc>) -> Self {
        Self { invoice_id, amount: None, currency: None, email: None, name: None, wallet: None, created_at }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_wallet(mut self, wallet: WalletAddress) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::InvalidAmount(amount.to_string()));
    }
    Ok(amount)
}

pub fn validate_currency(currency: &str) -> Result<String, ValidationError> {
    let code = currency.trim();
    if !(3..=5).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidCurrency(currency.to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

//--------------------------------------   InvoiceUpdate     ---------------------------------------------------------
/// A guarded partial update of an invoice row.
///
/// The guards are what make concurrent reconciliation safe:
/// * a status change only applies while the stored status is still open,
/// * a notification flag only applies while it is still unset,
/// * the token quote and `email_sent_at` are write-once,
/// * customer details only fill fields that are still empty.
///
/// If a status or flag guard fails the whole update is rejected, so the caller can tell that someone else got there
/// first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceUpdate {
    pub status: Option<InvoiceStatus>,
    pub token_price: Option<Decimal>,
    pub tokens_purchased: Option<Decimal>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub wallet: Option<WalletAddress>,
    pub email_sent_user: bool,
    pub email_sent_admin: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl InvoiceUpdate {
    pub fn transition(status: InvoiceStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn notified(channel: EmailChannel, at: DateTime<Utc>) -> Self {
        let mut update = Self::default();
        match channel {
            EmailChannel::User => {
                update.email_sent_user = true;
                update.email_sent_at = Some(at);
            },
            EmailChannel::Admin => update.email_sent_admin = true,
        }
        update
    }

    pub fn escalated(at: DateTime<Utc>) -> Self {
        Self { escalated_at: Some(at), ..Default::default() }
    }

    pub fn with_tokens(mut self, token_price: Decimal, tokens_purchased: Decimal) -> Self {
        self.token_price = Some(token_price);
        self.tokens_purchased = Some(tokens_purchased);
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_wallet(mut self, wallet: WalletAddress) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True if the status and flag guards hold against `record`.
    pub fn guards_hold(&self, record: &InvoiceRecord) -> bool {
        (self.status.is_none() || record.status.is_open())
            && (!self.email_sent_user || !record.email_sent_user)
            && (!self.email_sent_admin || !record.email_sent_admin)
    }

    /// Applies the update to a copy of `record`, following exactly the same rules as the SQL backend. Returns `None`
    /// if a guard rejects the update.
    pub fn apply_to(&self, record: &InvoiceRecord, now: DateTime<Utc>) -> Option<InvoiceRecord> {
        if !self.guards_hold(record) {
            return None;
        }
        let mut result = record.clone();
        result.updated_at = now;
        if let Some(status) = self.status {
            result.status = status;
        }
        result.token_price = result.token_price.or(self.token_price);
        result.tokens_purchased = result.tokens_purchased.or(self.tokens_purchased);
        fill_if_empty(&mut result.email, &self.email);
        fill_if_empty(&mut result.name, &self.name);
        if result.wallet.is_none() {
            result.wallet = self.wallet.clone();
        }
        result.email_sent_user |= self.email_sent_user;
        result.email_sent_admin |= self.email_sent_admin;
        result.email_sent_at = result.email_sent_at.or(self.email_sent_at);
        if self.escalated_at.is_some() {
            result.escalated_at = self.escalated_at;
        }
        Some(result)
    }
}

fn fill_if_empty(current: &mut Option<String>, incoming: &Option<String>) {
    let empty = current.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
    if empty && incoming.is_some() {
        *current = incoming.clone();
    }
}
