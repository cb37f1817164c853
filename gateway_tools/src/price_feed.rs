use std::{str::FromStr, sync::Arc};

use log::*;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::{ConfigError, PriceFeedConfig, PriceFeedKind},
    GatewayApiError,
};

pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const BINANCE_URL: &str = "https://api.binance.com/api/v3/ticker/price";

/// A source of the token's USD spot price.
#[derive(Debug, Clone)]
pub enum PriceFeed {
    CoinGecko { client: Arc<Client>, coin_id: String },
    Binance { client: Arc<Client>, symbol: String },
    Fixed(Decimal),
}

impl PriceFeed {
    /// Builds the feeds listed in `config`, in order.
    pub fn from_config(config: &PriceFeedConfig) -> Result<Vec<Self>, ConfigError> {
        config.check()?;
        let client = Arc::new(
            Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .map_err(|e| ConfigError::InvalidValue { name: "IPG_PRICE_FEEDS", value: e.to_string() })?,
        );
        let feeds = config
            .feeds
            .iter()
            .filter_map(|kind| match kind {
                PriceFeedKind::CoinGecko => config
                    .coingecko_id
                    .clone()
                    .map(|coin_id| Self::CoinGecko { client: Arc::clone(&client), coin_id }),
                PriceFeedKind::Binance => config
                    .binance_symbol
                    .clone()
                    .map(|symbol| Self::Binance { client: Arc::clone(&client), symbol }),
                PriceFeedKind::Fixed => config.fixed_price.map(Self::Fixed),
            })
            .collect::<Vec<_>>();
        info!("💱️ Price feeds: {}", feeds.iter().map(PriceFeed::name).collect::<Vec<_>>().join(", "));
        Ok(feeds)
    }

    pub fn name(&self) -> String {
        match self {
            Self::CoinGecko { coin_id, .. } => format!("coingecko:{coin_id}"),
            Self::Binance { symbol, .. } => format!("binance:{symbol}"),
            Self::Fixed(_) => "fixed".to_string(),
        }
    }

    pub async fn fetch_usd_price(&self) -> Result<Decimal, GatewayApiError> {
        match self {
            Self::CoinGecko { client, coin_id } => {
                let params = [("ids", coin_id.as_str()), ("vs_currencies", "usd")];
                let body = get_json(client, COINGECKO_URL, &params).await?;
                parse_coingecko_price(&body, coin_id)
            },
            Self::Binance { client, symbol } => {
                let body = get_json(client, BINANCE_URL, &[("symbol", symbol.as_str())]).await?;
                parse_binance_price(&body)
            },
            Self::Fixed(price) => Ok(*price),
        }
    }
}

async fn get_json(client: &Client, url: &str, params: &[(&str, &str)]) -> Result<Value, GatewayApiError> {
    trace!("💱️ Fetching {url}");
    let response = client.get(url).query(params).send().await.map_err(GatewayApiError::from_transport)?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.map_err(GatewayApiError::from_body)?;
        return Err(GatewayApiError::QueryError { status, message });
    }
    response.json::<Value>().await.map_err(GatewayApiError::from_body)
}

/// Reads the price out of a CoinGecko `simple/price` response, e.g. `{"paytoken": {"usd": 0.0082}}`.
pub fn parse_coingecko_price(body: &Value, coin_id: &str) -> Result<Decimal, GatewayApiError> {
    let price = body
        .get(coin_id)
        .and_then(|coin| coin.get("usd"))
        .ok_or_else(|| GatewayApiError::JsonError(format!("No USD price for {coin_id} in {body}")))?;
    decimal_from_json(price)
}

/// Reads the price out of a Binance ticker response, e.g. `{"symbol": "XTMUSDT", "price": "0.00820000"}`.
pub fn parse_binance_price(body: &Value) -> Result<Decimal, GatewayApiError> {
    let price = body.get("price").ok_or_else(|| GatewayApiError::JsonError(format!("No price in {body}")))?;
    decimal_from_json(price)
}

// Numbers go through their textual form so that 0.082 stays 0.082 rather than the nearest binary fraction.
fn decimal_from_json(value: &Value) -> Result<Decimal, GatewayApiError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(GatewayApiError::InvalidPrice(value.to_string())),
    };
    let price = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| GatewayApiError::InvalidPrice(format!("{text}. {e}")))?;
    if price <= Decimal::ZERO {
        return Err(GatewayApiError::InvalidPrice(text));
    }
    Ok(price.normalize())
}
