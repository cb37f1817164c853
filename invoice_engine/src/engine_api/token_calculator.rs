use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Purchased quantities are stored with this many decimal places.
pub const TOKEN_DECIMALS: u32 = 6;

/// The frozen price and quantity for a settled invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenQuote {
    pub token_price: Decimal,
    pub tokens_purchased: Decimal,
}

/// `amount / price`, rounded to [`TOKEN_DECIMALS`] places with midpoints rounded away from zero. Returns `None` for
/// a non-positive price, a negative amount, or on overflow.
pub fn tokens_for(amount: Decimal, price: Decimal) -> Option<Decimal> {
    if price <= Decimal::ZERO || amount < Decimal::ZERO {
        return None;
    }
    amount.checked_div(price).map(|q| q.round_dp_with_strategy(TOKEN_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
}

pub fn quote(amount: Decimal, price: Decimal) -> Option<TokenQuote> {
    tokens_for(amount, price).map(|tokens_purchased| TokenQuote { token_price: price, tokens_purchased })
}
