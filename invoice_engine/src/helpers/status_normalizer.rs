use log::trace;

use crate::db_types::InvoiceStatus;

/// Maps a gateway's free-form status or event name onto an [`InvoiceStatus`].
///
/// Matching is case-insensitive and treats `.`, `-` and spaces as `_`, so `invoice.paid`, `Invoice-Paid` and
/// `INVOICE_PAID` are the same token. Missing or unrecognised values map to `Pending`, which never causes a write.
pub fn normalize_status(raw: Option<&str>) -> InvoiceStatus {
    let Some(raw) = raw else {
        return InvoiceStatus::Pending;
    };
    let status = match canonical_token(raw).as_str() {
        "PAID" | "COMPLETED" | "APPROVED" | "SUCCESS" | "SUCCEEDED" | "CONFIRMED" | "ORDER_COMPLETED"
        | "INVOICE_PAID" => InvoiceStatus::Success,
        "CANCELLED" | "CANCELED" | "DECLINED" | "ERROR" | "EXPIRED" | "FAILED" | "ORDER_FAILED"
        | "INVOICE_EXPIRED" | "INVOICE_CANCELLED" => InvoiceStatus::Failed,
        "PARTIALLY_PAID" | "PARTIAL" | "INVOICE_PARTIALLY_PAID" => InvoiceStatus::Partial,
        "PROCESSING" | "CONFIRMING" | "IN_PROGRESS" | "ORDER_PROCESSING" => InvoiceStatus::Processing,
        _ => InvoiceStatus::Pending,
    };
    trace!("🧾️ Normalised status '{raw}' to {status}");
    status
}

fn canonical_token(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().chars().map(|c| if matches!(c, '.' | '-' | ' ') { '_' } else { c }).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn success_tokens() {
        for raw in ["PAID", "completed", "Approved", "invoice.paid", "Invoice-Paid", "order completed", "succeeded"] {
            assert_eq!(normalize_status(Some(raw)), InvoiceStatus::Success, "{raw}");
        }
    }

    #[test]
    fn failure_and_partial_tokens() {
        for raw in ["cancelled", "canceled", "DECLINED", "error", "invoice.expired", "order_failed", "Invoice Cancelled"]
        {
            assert_eq!(normalize_status(Some(raw)), InvoiceStatus::Failed, "{raw}");
        }
        for raw in ["partial", "PARTIALLY_PAID", "invoice.partially_paid"] {
            assert_eq!(normalize_status(Some(raw)), InvoiceStatus::Partial, "{raw}");
        }
    }

    #[test]
    fn processing_tokens() {
        for raw in ["processing", "CONFIRMING", "in-progress", "order.processing"] {
            assert_eq!(normalize_status(Some(raw)), InvoiceStatus::Processing, "{raw}");
        }
    }

    #[test]
    fn unknown_or_missing_is_pending() {
        assert_eq!(normalize_status(None), InvoiceStatus::Pending);
        assert_eq!(normalize_status(Some("")), InvoiceStatus::Pending);
        assert_eq!(normalize_status(Some("waiting")), InvoiceStatus::Pending);
        assert_eq!(normalize_status(Some("paid!")), InvoiceStatus::Pending);
        assert_eq!(normalize_status(Some("CREATED")), InvoiceStatus::Pending);
    }
}
