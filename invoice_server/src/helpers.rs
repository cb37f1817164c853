use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The HMAC-SHA256 of `data` under `secret`, hex encoded.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a signature sent by the gateway. Both hex and base64 encodings are accepted, and the comparison runs in
/// constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Some(expected) = decode_signature(signature) else {
        trace!("🔐️ The signature is neither hex nor base64");
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &str) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

// A SHA-256 MAC is 32 bytes: 64 hex characters or 44 base64 characters.
fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    if signature.len() == 64 {
        if let Ok(bytes) = hex::decode(signature) {
            return Some(bytes);
        }
    }
    base64::decode(signature).ok().filter(|b| b.len() == 32)
}
