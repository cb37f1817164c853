use thiserror::Error;

use crate::db_types::{InvoiceId, InvoiceRecord, InvoiceUpdate, NewInvoice};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The stored record for invoice {0} could not be read. {1}")]
    CorruptRecord(String, String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// The keyed invoice store that backs reconciliation.
///
/// Implementations must not hold any locks across calls. Every write is a single guarded statement (see
/// [`InvoiceUpdate`]), which is what lets concurrent handlers for the same invoice race safely.
#[allow(async_fn_in_trait)]
pub trait LedgerStore: Clone {
    /// Fetches the invoice with the given key, if it exists.
    async fn find(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceRecord>, LedgerError>;

    /// Inserts a new invoice. If an invoice with the same key already exists, it is returned unchanged and the
    /// second tuple element is `false`.
    async fn append(&self, invoice: NewInvoice) -> Result<(InvoiceRecord, bool), LedgerError>;

    /// Applies a guarded partial update. Returns the updated record, or `None` if the invoice does not exist or one
    /// of the update's guards rejected it.
    async fn update_fields(
        &self,
        invoice_id: &InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Option<InvoiceRecord>, LedgerError>;
}
