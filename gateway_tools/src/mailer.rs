use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{api::bearer_client, config::MailerConfig, EmailMessage, EmailReceipt, GatewayApiError};

/// Client for the transactional mail provider. Messages are posted as JSON to `{base_url}/emails`, and the provider
/// answers with the id of the accepted message.
#[derive(Clone)]
pub struct MailerApi {
    config: MailerConfig,
    client: Arc<Client>,
}

impl MailerApi {
    pub fn new(config: MailerConfig) -> Result<Self, GatewayApiError> {
        let client = bearer_client(config.api_key.reveal(), Some(std::time::Duration::from_secs(15)))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn sender(&self) -> &str {
        self.config.from.as_str()
    }

    pub fn admin_email(&self) -> &str {
        self.config.admin_email.as_str()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, GatewayApiError> {
        let url = format!("{}/emails", self.config.base_url.trim_end_matches('/'));
        trace!("📧️ Posting \"{}\" to {} recipient(s)", message.subject, message.to.len());
        let response = self.client.post(url).json(message).send().await.map_err(GatewayApiError::from_transport)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(GatewayApiError::from_body)?;
            return Err(GatewayApiError::QueryError { status, message });
        }
        let receipt = response.json::<EmailReceipt>().await.map_err(GatewayApiError::from_body)?;
        debug!("📧️ Mail provider accepted message {}", receipt.id);
        Ok(receipt)
    }
}
