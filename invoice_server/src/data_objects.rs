use invoice_engine::db_types::{InvoiceId, NewInvoice, ValidationError, WalletAddress};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The reply to a webhook delivery. Any 2xx reply stops the gateway from redelivering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceRequest {
    pub invoice_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

impl TryFrom<NewInvoiceRequest> for NewInvoice {
    type Error = ValidationError;

    fn try_from(req: NewInvoiceRequest) -> Result<Self, Self::Error> {
        let invoice_id = req.invoice_id.parse::<InvoiceId>()?;
        let mut invoice = NewInvoice::new(invoice_id, req.amount, &req.currency)?;
        if let Some(wallet) = req.wallet_address.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            invoice = invoice.with_wallet(wallet.parse::<WalletAddress>()?);
        }
        if let Some(email) = req.email.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            invoice = invoice.with_email(email);
        }
        if let Some(name) = req.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            invoice = invoice.with_name(name);
        }
        Ok(invoice)
    }
}

#[cfg(test)]
mod test {
    use invoice_engine::db_types::WalletNetwork;
    use rust_decimal::Decimal;

    use super::*;

    fn request(wallet: Option<&str>) -> NewInvoiceRequest {
        NewInvoiceRequest {
            invoice_id: "inv_1".into(),
            amount: Decimal::new(10000, 2),
            currency: "usd".into(),
            email: Some(" alice@example.com ".into()),
            name: None,
            wallet_address: wallet.map(String::from),
        }
    }

    #[test]
    fn valid_requests() {
        let invoice = NewInvoice::try_from(request(Some("0x52908400098527886E0F7030069857D2E4169EE7"))).unwrap();
        assert_eq!(invoice.currency.as_deref(), Some("USD"));
        assert_eq!(invoice.email.as_deref(), Some("alice@example.com"));
        assert_eq!(invoice.wallet.map(|w| w.network()), Some(WalletNetwork::Evm));
    }

    #[test]
    fn short_wallet_addresses_are_rejected() {
        let err = NewInvoice::try_from(request(Some("0x123"))).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidWalletAddress(_)));
    }

    #[test]
    fn blank_wallets_are_ignored() {
        let invoice = NewInvoice::try_from(request(Some("  "))).unwrap();
        assert!(invoice.wallet.is_none());
    }
}
