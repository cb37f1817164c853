use std::fmt::Debug;

use chrono::Utc;
use futures_util::future::join;
use log::*;

use crate::{
    db_types::{EmailChannel, InvoiceRecord},
    escalation::Escalation,
    invoice_objects::ResolvedView,
    ledger_api::{FlagOutcome, InvoiceLedger},
    traits::{LedgerStore, MessageId, NotificationChannel, NotificationError, Notifier},
};

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The persisted flag was already set. Nothing was sent.
    AlreadySent,
    /// The message was sent. `flagged` carries the record as it was stored after the flag was set, or `None` if the
    /// flag could not be written.
    Sent { message_id: MessageId, flagged: Option<InvoiceRecord> },
    /// The message could not be sent. The flag stays unset, so the next reconciliation tries again.
    Failed(String),
    /// There was nobody to send it to.
    Skipped(String),
}

/// Sends the once-only confirmation emails. A persisted flag is checked before, and set after, every send.
pub struct NotificationGate<B, N> {
    ledger: InvoiceLedger<B>,
    notifier: N,
}

impl<B, N> Debug for NotificationGate<B, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationGate")
    }
}

impl<B, N> NotificationGate<B, N> {
    pub fn new(ledger: InvoiceLedger<B>, notifier: N) -> Self {
        Self { ledger, notifier }
    }
}

impl<B, N> NotificationGate<B, N>
where
    B: LedgerStore,
    N: Notifier,
{
    pub async fn fire_user_email(&self, record: &InvoiceRecord) -> GateOutcome {
        self.fire(EmailChannel::User, record).await
    }

    pub async fn fire_admin_email(&self, record: &InvoiceRecord) -> GateOutcome {
        self.fire(EmailChannel::Admin, record).await
    }

    /// Fires both confirmation emails side by side and folds the stored flags back into `record`. A failure on one
    /// channel has no effect on the other.
    pub async fn fire_confirmations(&self, record: &mut InvoiceRecord) -> (GateOutcome, GateOutcome) {
        let (user, admin) = join(self.fire_user_email(record), self.fire_admin_email(record)).await;
        if let GateOutcome::Sent { flagged: Some(stored), .. } = &user {
            record.email_sent_user = stored.email_sent_user;
            record.email_sent_at = stored.email_sent_at;
        }
        if let GateOutcome::Sent { flagged: Some(stored), .. } = &admin {
            record.email_sent_admin = stored.email_sent_admin;
        }
        (user, admin)
    }

    async fn fire(&self, channel: EmailChannel, record: &InvoiceRecord) -> GateOutcome {
        let invoice_id = &record.invoice_id;
        let already_sent = match self.ledger.find(invoice_id).await {
            Ok(Some(fresh)) => fresh.notified(channel),
            Ok(None) => record.notified(channel),
            Err(e) => {
                warn!("📧️ Could not re-read invoice {invoice_id} before sending the {channel} email. {e}");
                record.notified(channel)
            },
        };
        if already_sent {
            trace!("📧️ The {channel} email for invoice {invoice_id} has already been sent");
            return GateOutcome::AlreadySent;
        }
        if channel == EmailChannel::User && record.customer_email().is_none() {
            info!("📧️ Invoice {invoice_id} has no customer email address. Not sending the user email.");
            return GateOutcome::Skipped("no customer email address".into());
        }
        let notification = match channel {
            EmailChannel::User => NotificationChannel::User,
            EmailChannel::Admin => NotificationChannel::Admin,
        };
        let message_id = match self.notifier.send(&notification, &ResolvedView::from(record)).await {
            Ok(id) => id,
            Err(e) => {
                warn!("📧️ The {channel} email for invoice {invoice_id} could not be sent. It will be retried. {e}");
                return GateOutcome::Failed(e.to_string());
            },
        };
        info!("📧️ Sent the {channel} email for invoice {invoice_id}. Message id: {message_id}");
        let flagged = match self.ledger.mark_notified(invoice_id, channel, Utc::now()).await {
            Ok(FlagOutcome::Set(stored)) => Some(stored),
            Ok(FlagOutcome::AlreadySet(stored)) => {
                warn!("📧️ The {channel} email flag for invoice {invoice_id} was set by a concurrent call");
                Some(stored)
            },
            Ok(FlagOutcome::Missing) => {
                warn!("📧️ Invoice {invoice_id} is not in the ledger, so the {channel} email flag was not stored");
                None
            },
            Err(e) => {
                error!("📧️ The {channel} email for invoice {invoice_id} was sent but the flag could not be stored. {e}");
                None
            },
        };
        GateOutcome::Sent { message_id, flagged }
    }

    /// Sends an operator alert. Alerts have no flag of their own.
    pub async fn send_escalation(
        &self,
        escalation: &Escalation,
        view: &ResolvedView,
    ) -> Result<MessageId, NotificationError> {
        self.notifier.send(&NotificationChannel::Escalation(escalation.clone()), view).await
    }
}
