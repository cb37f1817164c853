use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use ipg_common::{env_seconds, parse_list, Secret};
use log::*;
use rust_decimal::Decimal;
use thiserror::Error;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::seconds(8);
const DEFAULT_GATEWAY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_PRICE_TTL: Duration = Duration::seconds(60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingValue(&'static str),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("No usable price feeds are configured")]
    NoPriceFeeds,
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

//--------------------------------------    GatewayConfig    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base url of the gateway's REST API, e.g. `https://api.gateway.example/v1`
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Upper bound on a single status poll.
    pub timeout: std::time::Duration,
    pub max_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::default(),
            api_key: Secret::default(),
            timeout: std::time::Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT.num_seconds().unsigned_abs()),
            max_attempts: DEFAULT_GATEWAY_MAX_ATTEMPTS,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_string("IPG_GATEWAY_URL").unwrap_or_else(|| {
            error!("🪛️ IPG_GATEWAY_URL is not set. Invoice statuses cannot be polled.");
            String::default()
        });
        let api_key = Secret::from_env("IPG_GATEWAY_API_KEY");
        if api_key.is_unset() {
            error!("🪛️ IPG_GATEWAY_API_KEY is not set. Status polls will be rejected by the gateway.");
        }
        let timeout = env_seconds("IPG_GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT)
            .to_std()
            .unwrap_or_else(|_| Self::default().timeout);
        let max_attempts = match env_string("IPG_GATEWAY_MAX_ATTEMPTS").map(|s| s.parse::<u32>()) {
            Some(Ok(n)) if n > 0 => n,
            Some(_) => {
                warn!("🪛️ IPG_GATEWAY_MAX_ATTEMPTS must be a positive integer. Using {DEFAULT_GATEWAY_MAX_ATTEMPTS}.");
                DEFAULT_GATEWAY_MAX_ATTEMPTS
            },
            None => DEFAULT_GATEWAY_MAX_ATTEMPTS,
        };
        Self { base_url, api_key, timeout, max_attempts }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingValue("IPG_GATEWAY_URL"));
        }
        if self.api_key.is_unset() {
            return Err(ConfigError::MissingValue("IPG_GATEWAY_API_KEY"));
        }
        Ok(())
    }
}

//--------------------------------------     MailerConfig    ---------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MailerConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Sender address for every outgoing message.
    pub from: String,
    /// Recipient of admin confirmations and alerts.
    pub admin_email: String,
}

impl MailerConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_string("IPG_MAILER_URL").unwrap_or_else(|| {
            error!("🪛️ IPG_MAILER_URL is not set. No emails can be sent.");
            String::default()
        });
        let api_key = Secret::from_env("IPG_MAILER_API_KEY");
        let from = env_string("IPG_MAIL_FROM").unwrap_or_default();
        let admin_email = env_string("IPG_ADMIN_EMAIL").unwrap_or_else(|| {
            warn!("🪛️ IPG_ADMIN_EMAIL is not set. Admin notifications and alerts have nowhere to go.");
            String::default()
        });
        Self { base_url, api_key, from, admin_email }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingValue("IPG_MAILER_URL"));
        }
        if self.api_key.is_unset() {
            return Err(ConfigError::MissingValue("IPG_MAILER_API_KEY"));
        }
        if self.from.is_empty() {
            return Err(ConfigError::MissingValue("IPG_MAIL_FROM"));
        }
        if self.admin_email.is_empty() {
            return Err(ConfigError::MissingValue("IPG_ADMIN_EMAIL"));
        }
        Ok(())
    }
}

//--------------------------------------   PriceFeedConfig   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFeedKind {
    CoinGecko,
    Binance,
    Fixed,
}

impl Display for PriceFeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoinGecko => f.write_str("coingecko"),
            Self::Binance => f.write_str("binance"),
            Self::Fixed => f.write_str("fixed"),
        }
    }
}

impl FromStr for PriceFeedKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coingecko" => Ok(Self::CoinGecko),
            "binance" => Ok(Self::Binance),
            "fixed" => Ok(Self::Fixed),
            _ => Err(ConfigError::InvalidValue { name: "IPG_PRICE_FEEDS", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    /// Feeds in the order they are tried.
    pub feeds: Vec<PriceFeedKind>,
    pub coingecko_id: Option<String>,
    pub binance_symbol: Option<String>,
    pub fixed_price: Option<Decimal>,
    pub ttl: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            feeds: vec![PriceFeedKind::CoinGecko],
            coingecko_id: None,
            binance_symbol: None,
            fixed_price: None,
            ttl: DEFAULT_PRICE_TTL,
        }
    }
}

impl PriceFeedConfig {
    pub fn new_from_env_or_default() -> Self {
        let feeds = env_string("IPG_PRICE_FEEDS")
            .map(|s| {
                parse_list(&s)
                    .iter()
                    .filter_map(|name| {
                        name.parse::<PriceFeedKind>()
                            .map_err(|e| warn!("🪛️ Ignoring unknown price feed. {e}"))
                            .ok()
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| vec![PriceFeedKind::CoinGecko]);
        let fixed_price = env_string("IPG_FIXED_TOKEN_PRICE").and_then(|s| {
            s.parse::<Decimal>().map_err(|e| warn!("🪛️ IPG_FIXED_TOKEN_PRICE is not a valid number ({s}). {e}")).ok()
        });
        Self {
            feeds,
            coingecko_id: env_string("IPG_COINGECKO_ID"),
            binance_symbol: env_string("IPG_BINANCE_SYMBOL"),
            fixed_price,
            ttl: env_seconds("IPG_PRICE_TTL_SECS", DEFAULT_PRICE_TTL),
        }
    }

    /// Every listed feed must have the parameters it needs, and at least one feed must be listed.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoPriceFeeds);
        }
        for feed in &self.feeds {
            match feed {
                PriceFeedKind::CoinGecko if self.coingecko_id.is_none() => {
                    return Err(ConfigError::MissingValue("IPG_COINGECKO_ID"))
                },
                PriceFeedKind::Binance if self.binance_symbol.is_none() => {
                    return Err(ConfigError::MissingValue("IPG_BINANCE_SYMBOL"))
                },
                PriceFeedKind::Fixed => match self.fixed_price {
                    None => return Err(ConfigError::MissingValue("IPG_FIXED_TOKEN_PRICE")),
                    Some(p) if p <= Decimal::ZERO => {
                        return Err(ConfigError::InvalidValue { name: "IPG_FIXED_TOKEN_PRICE", value: p.to_string() })
                    },
                    _ => {},
                },
                _ => {},
            }
        }
        Ok(())
    }
}
