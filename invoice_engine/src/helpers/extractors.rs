//! Ordered lists of field extractors for gateway payloads.
//!
//! Gateways nest the same information in different places depending on the event type and API version. Each list
//! below is tried in order and the first non-empty value wins, so the precedence is explicit and each entry can be
//! tested on its own.
use serde_json::Value;

pub type Extractor = fn(&Value) -> Option<String>;

/// Applies each extractor in turn and returns the first non-empty result.
pub fn first_match(extractors: &[Extractor], value: &Value) -> Option<String> {
    extractors.iter().find_map(|extract| extract(value))
}

/// Reads the value at a JSON pointer as trimmed text. Numbers are rendered as text; empty strings, objects, arrays
/// and nulls count as missing.
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

macro_rules! extractors {
    ($name:ident => [$($pointer:literal),+ $(,)?]) => {
        pub const $name: &[Extractor] = &[$(|v: &Value| text_at(v, $pointer)),+];
    };
}

extractors!(INVOICE_KEY_EXTRACTORS => [
    "/invoice/id",
    "/invoice_id",
    "/invoiceId",
    "/order/id",
    "/order_id",
    "/data/invoice/id",
    "/data/invoice_id",
    "/data/id",
    "/id",
]);

extractors!(STATUS_EXTRACTORS => [
    "/status",
    "/invoice/status",
    "/order/status",
    "/data/status",
    "/data/invoice/status",
    "/payment_status",
    "/event",
    "/event_type",
    "/type",
]);

extractors!(EMAIL_EXTRACTORS => [
    "/email",
    "/customer/email",
    "/customer_email",
    "/metadata/email",
    "/invoice/email",
    "/data/email",
]);

extractors!(NAME_EXTRACTORS => [
    "/name",
    "/customer/name",
    "/customer_name",
    "/metadata/name",
    "/invoice/name",
    "/data/name",
]);

extractors!(WALLET_EXTRACTORS => [
    "/walletAddress",
    "/wallet_address",
    "/metadata/walletAddress",
    "/metadata/wallet_address",
    "/customer/walletAddress",
    "/invoice/walletAddress",
    "/data/walletAddress",
]);

extractors!(AMOUNT_EXTRACTORS => [
    "/amount",
    "/price_amount",
    "/invoice/amount",
    "/metadata/amount",
    "/data/amount",
]);

extractors!(CURRENCY_EXTRACTORS => [
    "/currency",
    "/price_currency",
    "/invoice/currency",
    "/metadata/currency",
    "/data/currency",
]);
