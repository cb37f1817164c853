use serde_json::Value;
use thiserror::Error;

use crate::db_types::InvoiceId;

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("The gateway did not respond in time. {0}")]
    Timeout(String),
    #[error("Could not reach the gateway. {0}")]
    Transport(String),
    #[error("The gateway replied with HTTP {status}. {message}")]
    Status { status: u16, message: String },
    #[error("The gateway response could not be read. {0}")]
    MalformedBody(String),
    #[error("No gateway has been configured")]
    NotConfigured,
}

impl UpstreamError {
    /// Client errors (other than rate limiting) and a missing gateway will not improve on a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::MalformedBody(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NotConfigured => false,
        }
    }
}

/// The gateway's answer to a status poll. `metadata` is the raw response body, from which customer details can be
/// extracted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayStatus {
    pub raw_status: Option<String>,
    pub metadata: Value,
}

#[allow(async_fn_in_trait)]
pub trait GatewayPoll {
    /// Asks the gateway for the current status of an invoice. A single attempt; retries are the caller's concern.
    async fn authoritative_status(&self, invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError>;
}

/// Stand-in for deployments that only accept webhooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGateway;

impl GatewayPoll for NoGateway {
    async fn authoritative_status(&self, _invoice_id: &InvoiceId) -> Result<GatewayStatus, UpstreamError> {
        Err(UpstreamError::NotConfigured)
    }
}
