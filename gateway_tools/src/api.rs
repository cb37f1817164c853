use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::GatewayConfig, GatewayApiError, GatewayInvoice};

/// Client for the payment gateway's REST API.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let client = bearer_client(config.api_key.reveal(), Some(config.timeout))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("🛰️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(GatewayApiError::from_transport)?;
        if response.status().is_success() {
            trace!("🛰️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(GatewayApiError::from_body)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(GatewayApiError::from_body)?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Fetches the gateway's current view of an invoice.
    pub async fn get_invoice(&self, invoice_id: &str) -> Result<GatewayInvoice, GatewayApiError> {
        let path = format!("/invoices/{invoice_id}");
        debug!("🛰️ Fetching invoice {invoice_id} from the gateway");
        let invoice = self.rest_query::<GatewayInvoice, ()>(Method::GET, &path, &[], None).await?;
        trace!("🛰️ Gateway response for {invoice_id}: {}", invoice.body);
        Ok(invoice)
    }
}

/// A JSON client that sends `Authorization: Bearer <key>` with every request.
pub(crate) fn bearer_client(api_key: &str, timeout: Option<std::time::Duration>) -> Result<Client, GatewayApiError> {
    let mut headers = HeaderMap::with_capacity(2);
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| GatewayApiError::Initialization(e.to_string()))
}
