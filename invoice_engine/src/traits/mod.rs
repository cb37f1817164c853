mod gateway;
mod ledger_store;
mod notifier;
mod price_source;

pub use gateway::{GatewayPoll, GatewayStatus, NoGateway, UpstreamError};
pub use ledger_store::{LedgerError, LedgerStore};
pub use notifier::{MessageId, NotificationChannel, NotificationError, Notifier};
pub use price_source::{PriceError, PriceSource};
