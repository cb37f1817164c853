use gateway_tools::{GatewayApiError, PriceFeed};
use invoice_engine::traits::{PriceError, PriceSource};
use rust_decimal::Decimal;

/// A configured price feed, as seen by the engine's price oracle.
#[derive(Debug, Clone)]
pub struct FeedSource(pub PriceFeed);

impl PriceSource for FeedSource {
    fn name(&self) -> String {
        self.0.name()
    }

    async fn fetch_spot_price(&self) -> Result<Decimal, PriceError> {
        self.0.fetch_usd_price().await.map_err(|e| match e {
            GatewayApiError::InvalidPrice(s) => PriceError::InvalidPrice(s),
            e => PriceError::Unavailable(e.to_string()),
        })
    }
}
