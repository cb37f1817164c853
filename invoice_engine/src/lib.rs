//! Invoice Engine
//!
//! The invoice engine converges payment signals from an external gateway into one record per invoice. Signals arrive
//! as webhook deliveries and as answers to status polls, in any order, possibly duplicated and possibly concurrently.
//! The engine guarantees that a settled invoice is never changed again, that the token quote is computed once, and
//! that each confirmation email is sent at most once.
//!
//! The library is divided into:
//! 1. The ledger backend ([`SqliteDatabase`]) and the data types stored in it ([`mod@db_types`]).
//! 2. The collaborator traits ([`mod@traits`]) that a deployment implements for its gateway, mailer and price feeds.
//! 3. The engine API, with [`ReconciliationApi`] at its centre.
mod engine_api;

pub mod db_types;
pub mod helpers;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    errors::{self, ReconcileError},
    escalation::{self, Escalation, EscalationKind, EscalationMonitor, AWAITING_WEBHOOK},
    invoice_objects::{
        self,
        InvoiceMetadata,
        ReconcileOutcome,
        Reconciliation,
        ResolvedView,
        SignalOrigin,
        SignalSource,
        WebhookPayload,
    },
    ledger_api::{self, FlagOutcome, InvoiceLedger, SettleOutcome},
    notification_gate::{self, GateOutcome, NotificationGate},
    price_oracle::{self, PriceCache, PriceOracle, SpotPrice},
    reconciliation_api::{self, EngineOptions, ReconciliationApi},
    token_calculator::{self, TokenQuote, TOKEN_DECIMALS},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
