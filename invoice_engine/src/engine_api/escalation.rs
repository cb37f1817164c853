use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{InvoiceId, InvoiceRecord, InvoiceStatus};

/// Display label for an open invoice that has waited longer than the stuck threshold.
pub const AWAITING_WEBHOOK: &str = "AWAITING_WEBHOOK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationKind {
    /// Still open after the stuck threshold.
    StuckInvoice,
    /// Paid, but the customer has not been sent a confirmation within the grace period.
    UndeliveredUserEmail,
}

impl Display for EscalationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StuckInvoice => f.write_str("stuck invoice"),
            Self::UndeliveredUserEmail => f.write_str("undelivered user email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escalation {
    pub kind: EscalationKind,
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub age_minutes: i64,
}

/// Decides when an invoice needs an operator's attention.
///
/// Without a cool-down every call past a threshold raises another alert.
#[derive(Debug, Clone)]
pub struct EscalationMonitor {
    pub stuck_after: Duration,
    pub user_email_grace: Duration,
    pub cooldown: Option<Duration>,
}

impl Default for EscalationMonitor {
    fn default() -> Self {
        Self { stuck_after: Duration::minutes(10), user_email_grace: Duration::minutes(5), cooldown: None }
    }
}

impl EscalationMonitor {
    pub fn new(stuck_after: Duration, user_email_grace: Duration, cooldown: Option<Duration>) -> Self {
        Self { stuck_after, user_email_grace, cooldown }
    }

    pub fn assess(&self, record: &InvoiceRecord, now: DateTime<Utc>) -> Option<Escalation> {
        let age = record.age(now);
        let kind = if record.status.is_open() && age > self.stuck_after {
            EscalationKind::StuckInvoice
        } else if record.status == InvoiceStatus::Success && !record.email_sent_user && age > self.user_email_grace {
            EscalationKind::UndeliveredUserEmail
        } else {
            return None;
        };
        Some(Escalation {
            kind,
            invoice_id: record.invoice_id.clone(),
            status: record.status,
            age_minutes: age.num_minutes(),
        })
    }

    /// True if an alert was sent recently enough that another one should be held back.
    pub fn is_suppressed(&self, record: &InvoiceRecord, now: DateTime<Utc>) -> bool {
        match (self.cooldown, record.escalated_at) {
            (Some(cooldown), Some(last)) => now - last < cooldown,
            _ => false,
        }
    }

    pub fn display_status(&self, record: &InvoiceRecord, now: DateTime<Utc>) -> String {
        if record.status.is_open() && record.age(now) > self.stuck_after {
            AWAITING_WEBHOOK.to_string()
        } else {
            record.status.to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(status: InvoiceStatus, age_minutes: i64, now: DateTime<Utc>) -> InvoiceRecord {
        let mut r = InvoiceRecord::placeholder("inv_1".parse().unwrap(), now - Duration::minutes(age_minutes));
        r.status = status;
        r
    }

    #[test]
    fn stuck_invoices() {
        let now = Utc::now();
        let monitor = EscalationMonitor::default();
        assert!(monitor.assess(&record(InvoiceStatus::Created, 9, now), now).is_none());
        let e = monitor.assess(&record(InvoiceStatus::Created, 16, now), now).unwrap();
        assert_eq!(e.kind, EscalationKind::StuckInvoice);
        assert_eq!(e.age_minutes, 16);
        assert!(monitor.assess(&record(InvoiceStatus::Failed, 60, now), now).is_none());
    }

    #[test]
    fn undelivered_user_email() {
        let now = Utc::now();
        let monitor = EscalationMonitor::default();
        let mut r = record(InvoiceStatus::Success, 6, now);
        assert_eq!(monitor.assess(&r, now).unwrap().kind, EscalationKind::UndeliveredUserEmail);
        r.email_sent_user = true;
        assert!(monitor.assess(&r, now).is_none());
        assert!(monitor.assess(&record(InvoiceStatus::Success, 4, now), now).is_none());
    }

    #[test]
    fn display_label() {
        let now = Utc::now();
        let monitor = EscalationMonitor::default();
        assert_eq!(monitor.display_status(&record(InvoiceStatus::Created, 16, now), now), AWAITING_WEBHOOK);
        assert_eq!(monitor.display_status(&record(InvoiceStatus::Pending, 2, now), now), "PENDING");
        assert_eq!(monitor.display_status(&record(InvoiceStatus::Success, 60, now), now), "SUCCESS");
    }

    #[test]
    fn cooldown() {
        let now = Utc::now();
        let mut r = record(InvoiceStatus::Created, 30, now);
        r.escalated_at = Some(now - Duration::minutes(5));
        assert!(!EscalationMonitor::default().is_suppressed(&r, now));
        let monitor = EscalationMonitor::new(Duration::minutes(10), Duration::minutes(5), Some(Duration::minutes(15)));
        assert!(monitor.is_suppressed(&r, now));
        r.escalated_at = Some(now - Duration::minutes(20));
        assert!(!monitor.is_suppressed(&r, now));
    }
}
