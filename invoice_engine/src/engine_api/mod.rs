//! # Invoice engine public API
//!
//! * [`reconciliation_api`] is the primary API. It reconciles webhook deliveries and status checks into the ledger.
//! * [`ledger_api`] wraps a [`crate::traits::LedgerStore`] with the writes reconciliation makes, and is used directly
//!   to open new invoices.
//! * [`notification_gate`] sends the once-only confirmation emails.
//! * [`price_oracle`] and [`token_calculator`] price a settled invoice.
//! * [`escalation`] decides when an invoice needs an operator.
//!
//! Every API is generic over its collaborators, which are supplied at construction:
//!
//! ```rust,ignore
//! use invoice_engine::{EngineOptions, PriceOracle, ReconciliationApi, SignalSource, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/invoices.db", 25).await?;
//! let oracle = PriceOracle::new(vec![my_price_feed], chrono::Duration::seconds(60));
//! let api = ReconciliationApi::new(db, my_gateway, my_mailer, oracle, EngineOptions::default());
//! let view = api.reconcile(&invoice_id, SignalSource::StatusCheck, None).await?;
//! ```

pub mod errors;
pub mod escalation;
pub mod invoice_objects;
pub mod ledger_api;
pub mod notification_gate;
pub mod price_oracle;
pub mod reconciliation_api;
pub mod token_calculator;
