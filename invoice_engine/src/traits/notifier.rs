use std::fmt::Display;

use thiserror::Error;

use crate::{escalation::Escalation, invoice_objects::ResolvedView};

/// The provider-assigned identifier of a sent message. Only a message id counts as a confirmed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(pub String);

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationChannel {
    /// Payment confirmation to the customer.
    User,
    /// Payment confirmation to the operators.
    Admin,
    /// Operator alert for an invoice that needs attention.
    Escalation(Escalation),
}

impl Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
            Self::Escalation(e) => write!(f, "escalation ({})", e.kind),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The message has no recipient. {0}")]
    NoRecipient(String),
    #[error("The mail provider rejected the message. {0}")]
    Rejected(String),
    #[error("Could not reach the mail provider. {0}")]
    Transport(String),
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, channel: &NotificationChannel, invoice: &ResolvedView) -> Result<MessageId, NotificationError>;
}
