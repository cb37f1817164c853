use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An invoice as the payment gateway reports it. The gateway's schema is not pinned down, so the body is kept as-is
/// and callers pick the fields they need out of it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GatewayInvoice {
    pub body: Value,
}

impl GatewayInvoice {
    /// Some gateways wrap the invoice in an `invoice` or `data` envelope. This returns the innermost object.
    pub fn unwrapped(&self) -> &Value {
        ["invoice", "data"]
            .iter()
            .find_map(|key| self.body.get(key).filter(|v| v.is_object()))
            .unwrap_or(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailReceipt {
    pub id: String,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn unwrap_envelopes() {
        let plain = GatewayInvoice { body: json!({"id": "a", "status": "PAID"}) };
        assert_eq!(plain.unwrapped()["status"], "PAID");
        let wrapped = GatewayInvoice { body: json!({"invoice": {"id": "a", "status": "EXPIRED"}}) };
        assert_eq!(wrapped.unwrapped()["status"], "EXPIRED");
        let data = GatewayInvoice { body: json!({"data": {"status": "PENDING"}, "invoice": "a"}) };
        assert_eq!(data.unwrapped()["status"], "PENDING");
    }

    #[test]
    fn email_serialization() {
        let msg = EmailMessage {
            from: "billing@example.com".into(),
            to: vec!["alice@example.com".into()],
            subject: "Paid".into(),
            text: "Thanks".into(),
            tags: vec![],
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert!(v.get("tags").is_none());
        assert_eq!(v["to"][0], "alice@example.com");
    }
}
