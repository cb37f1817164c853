use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PriceError {
    #[error("The price feed is unavailable. {0}")]
    Unavailable(String),
    #[error("The price feed returned an unusable price. {0}")]
    InvalidPrice(String),
}

/// A single spot price provider. The oracle tries providers in order until one answers.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    fn name(&self) -> String;
    /// The price of one token in the invoice currency.
    async fn fetch_spot_price(&self) -> Result<Decimal, PriceError>;
}
