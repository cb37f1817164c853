use once_cell::sync::Lazy;
use regex::Regex;

use crate::db_types::{ValidationError, WalletNetwork};

const BASE58: &str = "1-9A-HJ-NP-Za-km-z";

static WALLET_PATTERNS: Lazy<Vec<(WalletNetwork, Regex)>> = Lazy::new(|| {
    vec![
        (WalletNetwork::Evm, Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap()),
        (WalletNetwork::Tron, Regex::new(&format!("^T[{BASE58}]{{33}}$")).unwrap()),
        (
            WalletNetwork::Bitcoin,
            Regex::new(&format!("^(bc1[02-9ac-hj-np-z]{{39,59}}|[13][{BASE58}]{{25,34}})$")).unwrap(),
        ),
        (WalletNetwork::Solana, Regex::new(&format!("^[{BASE58}]{{43,44}}$")).unwrap()),
    ]
});

/// Works out which network an address belongs to from its shape alone. An address must match exactly one network.
pub fn detect_wallet_network(address: &str) -> Result<WalletNetwork, ValidationError> {
    let address = address.trim();
    let mut matches = WALLET_PATTERNS.iter().filter(|(_, re)| re.is_match(address)).map(|(n, _)| *n);
    match (matches.next(), matches.next()) {
        (Some(network), None) => Ok(network),
        (Some(_), Some(_)) => Err(ValidationError::AmbiguousWalletAddress(address.to_string())),
        (None, _) => Err(ValidationError::InvalidWalletAddress(address.to_string())),
    }
}
