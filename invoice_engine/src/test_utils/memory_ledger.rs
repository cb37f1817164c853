use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    db_types::{InvoiceId, InvoiceRecord, InvoiceStatus, InvoiceUpdate, NewInvoice},
    traits::{LedgerError, LedgerStore},
};

/// An in-memory [`LedgerStore`] that applies updates with the same guards as the SQLite backend. Clones share the
/// same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    invoices: Arc<Mutex<HashMap<InvoiceId, InvoiceRecord>>>,
}

impl MemoryLedger {
    /// Stores a record as-is, replacing any existing one. Used to seed fixtures.
    pub async fn insert(&self, record: InvoiceRecord) {
        self.invoices.lock().await.insert(record.invoice_id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.invoices.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.lock().await.is_empty()
    }
}

fn record_from(invoice: NewInvoice) -> InvoiceRecord {
    InvoiceRecord {
        invoice_id: invoice.invoice_id,
        status: InvoiceStatus::Created,
        email: invoice.email,
        name: invoice.name,
        wallet: invoice.wallet,
        amount: invoice.amount,
        currency: invoice.currency,
        token_price: None,
        tokens_purchased: None,
        email_sent_user: false,
        email_sent_admin: false,
        created_at: invoice.created_at,
        updated_at: invoice.created_at,
        email_sent_at: None,
        escalated_at: None,
    }
}

impl LedgerStore for MemoryLedger {
    async fn find(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceRecord>, LedgerError> {
        Ok(self.invoices.lock().await.get(invoice_id).cloned())
    }

    async fn append(&self, invoice: NewInvoice) -> Result<(InvoiceRecord, bool), LedgerError> {
        let mut invoices = self.invoices.lock().await;
        if let Some(existing) = invoices.get(&invoice.invoice_id) {
            return Ok((existing.clone(), false));
        }
        let record = record_from(invoice);
        invoices.insert(record.invoice_id.clone(), record.clone());
        Ok((record, true))
    }

    async fn update_fields(
        &self,
        invoice_id: &InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Option<InvoiceRecord>, LedgerError> {
        let mut invoices = self.invoices.lock().await;
        let Some(current) = invoices.get(invoice_id) else {
            return Ok(None);
        };
        let Some(updated) = update.apply_to(current, Utc::now()) else {
            return Ok(None);
        };
        invoices.insert(invoice_id.clone(), updated.clone());
        Ok(Some(updated))
    }
}
