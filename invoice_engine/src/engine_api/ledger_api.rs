use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{EmailChannel, InvoiceId, InvoiceRecord, InvoiceUpdate, NewInvoice},
    token_calculator::TokenQuote,
    traits::{LedgerError, LedgerStore},
};

/// The result of trying to move an invoice into a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// This call made the transition.
    Applied(InvoiceRecord),
    /// The invoice was already settled when the write landed. Carries the stored record.
    Superseded(InvoiceRecord),
    /// There is no such invoice.
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlagOutcome {
    Set(InvoiceRecord),
    AlreadySet(InvoiceRecord),
    Missing,
}

/// `InvoiceLedger` wraps a [`LedgerStore`] with the handful of writes reconciliation actually makes, and turns a
/// rejected guarded write into an explanation of who got there first.
pub struct InvoiceLedger<B> {
    db: B,
}

impl<B> Debug for InvoiceLedger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceLedger")
    }
}

impl<B: Clone> Clone for InvoiceLedger<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> InvoiceLedger<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> InvoiceLedger<B>
where B: LedgerStore
{
    pub async fn find(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceRecord>, LedgerError> {
        self.db.find(invoice_id).await
    }

    /// Records a new invoice. Calling this again with the same key returns the existing record untouched.
    pub async fn open_invoice(&self, invoice: NewInvoice) -> Result<(InvoiceRecord, bool), LedgerError> {
        let invoice_id = invoice.invoice_id.clone();
        let (record, inserted) = self.db.append(invoice).await?;
        if inserted {
            info!("🗃️ Invoice {invoice_id} added to the ledger");
        } else {
            debug!("🗃️ Invoice {invoice_id} is already in the ledger. Nothing was inserted.");
        }
        Ok((record, inserted))
    }

    /// Writes a terminal status (plus whatever else is in `update`), but only if the stored status is still open.
    pub async fn settle(&self, invoice_id: &InvoiceId, update: InvoiceUpdate) -> Result<SettleOutcome, LedgerError> {
        let target = update.status;
        match self.db.update_fields(invoice_id, update).await? {
            Some(record) => {
                info!("🗃️ Invoice {invoice_id} settled as {}", record.status);
                Ok(SettleOutcome::Applied(record))
            },
            None => match self.db.find(invoice_id).await? {
                Some(record) => {
                    info!(
                        "🗃️ Invoice {invoice_id} was already {} when trying to settle it as {}. Keeping the stored \
                         status.",
                        record.status,
                        target.map(|s| s.to_string()).unwrap_or_default()
                    );
                    Ok(SettleOutcome::Superseded(record))
                },
                None => {
                    warn!("🗃️ Cannot settle invoice {invoice_id}. It is not in the ledger.");
                    Ok(SettleOutcome::Missing)
                },
            },
        }
    }

    /// Stores a token quote for a settled invoice that does not have one yet. An existing quote is never replaced.
    pub async fn backfill_tokens(
        &self,
        invoice_id: &InvoiceId,
        quote: TokenQuote,
    ) -> Result<Option<InvoiceRecord>, LedgerError> {
        let update = InvoiceUpdate::default().with_tokens(quote.token_price, quote.tokens_purchased);
        let result = self.db.update_fields(invoice_id, update).await?;
        if let Some(record) = &result {
            debug!(
                "🗃️ Token quote for invoice {invoice_id} is {:?} at {:?}",
                record.tokens_purchased, record.token_price
            );
        }
        Ok(result)
    }

    /// Flips a notification flag from false to true. Only the first caller gets [`FlagOutcome::Set`].
    pub async fn mark_notified(
        &self,
        invoice_id: &InvoiceId,
        channel: EmailChannel,
        at: DateTime<Utc>,
    ) -> Result<FlagOutcome, LedgerError> {
        match self.db.update_fields(invoice_id, InvoiceUpdate::notified(channel, at)).await? {
            Some(record) => {
                debug!("🗃️ Invoice {invoice_id}: {channel} email flag set");
                Ok(FlagOutcome::Set(record))
            },
            None => match self.db.find(invoice_id).await? {
                Some(record) => Ok(FlagOutcome::AlreadySet(record)),
                None => Ok(FlagOutcome::Missing),
            },
        }
    }

    pub async fn mark_escalated(
        &self,
        invoice_id: &InvoiceId,
        at: DateTime<Utc>,
    ) -> Result<Option<InvoiceRecord>, LedgerError> {
        self.db.update_fields(invoice_id, InvoiceUpdate::escalated(at)).await
    }
}
