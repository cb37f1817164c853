use gateway_tools::{GatewayApi, GatewayApiError};
use invoice_engine::{
    db_types::InvoiceId,
    helpers::{first_match, STATUS_EXTRACTORS},
    traits::{GatewayPoll, GatewayStatus, UpstreamError},
};
use log::*;

/// Polls the payment gateway's REST API for an invoice's status.
#[derive(Clone)]
pub struct GatewayPoller {
    api: GatewayApi,
}

impl GatewayPoller {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }
}

impl GatewayPoll for GatewayPoller {
    async fn authoritative_status(&self, invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError> {
        let invoice = self.api.get_invoice(invoice_id.as_str()).await.map_err(upstream_error)?;
        let raw_status = first_match(STATUS_EXTRACTORS, &invoice.body);
        if raw_status.is_none() {
            debug!("🛰️ The gateway's answer for invoice {invoice_id} has no status");
        }
        Ok(GatewayStatus { raw_status, metadata: invoice.body })
    }
}

pub fn upstream_error(e: GatewayApiError) -> UpstreamError {
    match e {
        GatewayApiError::Timeout(s) => UpstreamError::Timeout(s),
        GatewayApiError::QueryError { status, message } => UpstreamError::Status { status, message },
        GatewayApiError::JsonError(s) | GatewayApiError::InvalidPrice(s) => UpstreamError::MalformedBody(s),
        GatewayApiError::Initialization(s) |
        GatewayApiError::RestRequestError(s) |
        GatewayApiError::RestResponseError(s) => UpstreamError::Transport(s),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_mapping() {
        let e = upstream_error(GatewayApiError::QueryError { status: 503, message: "busy".into() });
        assert!(matches!(e, UpstreamError::Status { status: 503, .. }));
        assert!(e.is_retryable());
        let e = upstream_error(GatewayApiError::QueryError { status: 404, message: "no such invoice".into() });
        assert!(!e.is_retryable());
        assert!(matches!(upstream_error(GatewayApiError::Timeout("8s".into())), UpstreamError::Timeout(_)));
        assert!(matches!(upstream_error(GatewayApiError::JsonError("eof".into())), UpstreamError::MalformedBody(_)));
    }
}
