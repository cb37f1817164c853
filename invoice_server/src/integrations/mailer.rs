use gateway_tools::{EmailMessage, GatewayApiError, MailerApi};
use invoice_engine::{
    escalation::EscalationKind,
    traits::{MessageId, NotificationChannel, NotificationError, Notifier},
    ResolvedView,
};
use log::*;

/// Sends the engine's notifications as plain-text emails through the mail provider.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: MailerApi,
}

impl EmailNotifier {
    pub fn new(mailer: MailerApi) -> Self {
        Self { mailer }
    }
}

impl Notifier for EmailNotifier {
    async fn send(&self, channel: &NotificationChannel, invoice: &ResolvedView) -> Result<MessageId, NotificationError> {
        let recipient = match channel {
            NotificationChannel::User => invoice.email.clone(),
            NotificationChannel::Admin | NotificationChannel::Escalation(_) => {
                Some(self.mailer.admin_email().to_string()).filter(|s| !s.is_empty())
            },
        };
        let to = recipient.ok_or_else(|| NotificationError::NoRecipient(format!("{channel} email")))?;
        let message = compose(self.mailer.sender(), to, channel, invoice);
        trace!("📧️ Sending {channel} email for invoice {}", invoice.invoice_id);
        let receipt = self.mailer.send(&message).await.map_err(|e| match e {
            GatewayApiError::QueryError { status, message } if (400..500).contains(&status) && status != 429 => {
                NotificationError::Rejected(format!("HTTP {status}. {message}"))
            },
            e => NotificationError::Transport(e.to_string()),
        })?;
        Ok(MessageId(receipt.id))
    }
}

pub fn compose(from: &str, to: String, channel: &NotificationChannel, invoice: &ResolvedView) -> EmailMessage {
    let id = &invoice.invoice_id;
    let (subject, text, tag) = match channel {
        NotificationChannel::User => {
            (format!("Payment received for invoice {id}"), user_body(invoice), "payment-confirmation")
        },
        NotificationChannel::Admin => (format!("Invoice {id} has been paid"), summary(invoice), "payment-admin"),
        NotificationChannel::Escalation(e) => {
            let what = match e.kind {
                EscalationKind::StuckInvoice => {
                    format!("Invoice {id} has been {} for {} minutes without a final status.", e.status, e.age_minutes)
                },
                EscalationKind::UndeliveredUserEmail => format!(
                    "Invoice {id} was created {} minutes ago and is paid, but the customer has not received a \
                     confirmation.",
                    e.age_minutes
                ),
            };
            (format!("[ALERT] Invoice {id}: {}", e.kind), format!("{what}\n\n{}", summary(invoice)), "escalation")
        },
    };
    EmailMessage { from: from.to_string(), to: vec![to], subject, text, tags: vec![tag.to_string()] }
}

fn user_body(invoice: &ResolvedView) -> String {
    let greeting = invoice.name.as_deref().map(|n| format!("Hi {n},")).unwrap_or_else(|| "Hi,".to_string());
    let mut lines =
        vec![greeting, String::new(), format!("We have received your payment for invoice {}.", invoice.invoice_id)];
    if let (Some(amount), Some(currency)) = (invoice.amount, invoice.currency.as_deref()) {
        lines.push(format!("Amount: {amount} {currency}"));
    }
    if let (Some(tokens), Some(price)) = (invoice.tokens_purchased, invoice.token_price) {
        lines.push(format!("Tokens purchased: {tokens} at {price} each"));
    }
    if let Some(wallet) = &invoice.wallet_address {
        lines.push(format!("Delivery wallet: {wallet}"));
    }
    lines.join("\n")
}

fn summary(invoice: &ResolvedView) -> String {
    let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    [
        format!("Invoice:  {}", invoice.invoice_id),
        format!("Status:   {} ({})", invoice.status, invoice.display_status),
        format!("Amount:   {} {}", opt(invoice.amount.map(|a| a.to_string())), opt(invoice.currency.clone())),
        format!(
            "Tokens:   {} at {}",
            opt(invoice.tokens_purchased.map(|t| t.to_string())),
            opt(invoice.token_price.map(|p| p.to_string()))
        ),
        format!("Customer: {} <{}>", opt(invoice.name.clone()), opt(invoice.email.clone())),
        format!("Wallet:   {}", opt(invoice.wallet_address.clone())),
        format!("Created:  {}", invoice.created_at),
    ]
    .join("\n")
}
