mod extractors;
mod retry;
mod status_normalizer;
mod wallet_address;

pub use extractors::{
    first_match,
    Extractor,
    AMOUNT_EXTRACTORS,
    CURRENCY_EXTRACTORS,
    EMAIL_EXTRACTORS,
    INVOICE_KEY_EXTRACTORS,
    NAME_EXTRACTORS,
    STATUS_EXTRACTORS,
    WALLET_EXTRACTORS,
};
pub use retry::RetryPolicy;
pub use status_normalizer::normalize_status;
pub use wallet_address::detect_wallet_network;
