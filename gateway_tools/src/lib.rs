//! HTTP clients for the services the invoice gateway talks to: the payment gateway's REST API, the token price feeds
//! and the transactional mail provider.
mod api;
mod config;
mod data_objects;
mod error;
mod mailer;
mod price_feed;

pub use api::GatewayApi;
pub use config::{ConfigError, GatewayConfig, MailerConfig, PriceFeedConfig, PriceFeedKind};
pub use data_objects::{EmailMessage, EmailReceipt, GatewayInvoice};
pub use error::GatewayApiError;
pub use mailer::MailerApi;
pub use price_feed::{parse_binance_price, parse_coingecko_price, PriceFeed};
