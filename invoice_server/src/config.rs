//! Server configuration, read from environment variables. Run the server binary with any argument to see the full
//! list.
use std::env;

use chrono::Duration;
use gateway_tools::{ConfigError, GatewayConfig, MailerConfig, PriceFeedConfig};
use invoice_engine::{helpers::RetryPolicy, EngineOptions};
use ipg_common::{env_flag, env_minutes, Secret};
use log::*;

const DEFAULT_IPG_HOST: &str = "127.0.0.1";
const DEFAULT_IPG_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/invoices.db";
const DEFAULT_SIGNATURE_HEADER: &str = "X-Gateway-Signature";
const DEFAULT_STUCK_AFTER: Duration = Duration::minutes(10);
const DEFAULT_USER_EMAIL_GRACE: Duration = Duration::minutes(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub mailer: MailerConfig,
    pub price_feeds: PriceFeedConfig,
    pub webhook: WebhookConfig,
    /// An open invoice older than this raises an alert and is reported as `AWAITING_WEBHOOK`.
    pub stuck_after: Duration,
    /// A paid invoice whose customer has not been emailed after this long raises an alert.
    pub user_email_grace: Duration,
    /// If set, repeat alerts for the same invoice are held back for this long.
    pub escalation_cooldown: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub secret: Secret<String>,
    pub signature_header: String,
    /// Accept webhooks that carry no signature. **DANGER**. Their metadata is never trusted, but their status is
    /// still acted on when the gateway cannot be polled.
    pub allow_unsigned: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: Secret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            allow_unsigned: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_IPG_HOST.to_string(),
            port: DEFAULT_IPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            mailer: MailerConfig::default(),
            price_feeds: PriceFeedConfig::default(),
            webhook: WebhookConfig::default(),
            stuck_after: DEFAULT_STUCK_AFTER,
            user_email_grace: DEFAULT_USER_EMAIL_GRACE,
            escalation_cooldown: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("IPG_HOST").ok().unwrap_or_else(|| DEFAULT_IPG_HOST.into());
        let port = env::var("IPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for IPG_PORT. {e} Using the default, {DEFAULT_IPG_PORT}, instead."
                    );
                    DEFAULT_IPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_IPG_PORT);
        let database_url = env::var("IPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ IPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let escalation_cooldown = env::var("IPG_ESCALATION_COOLDOWN_MINUTES")
            .ok()
            .map(|_| env_minutes("IPG_ESCALATION_COOLDOWN_MINUTES", Duration::zero()))
            .filter(|d| !d.is_zero());
        Self {
            host,
            port,
            database_url,
            gateway: GatewayConfig::new_from_env_or_default(),
            mailer: MailerConfig::new_from_env_or_default(),
            price_feeds: PriceFeedConfig::new_from_env_or_default(),
            webhook: WebhookConfig::from_env_or_default(),
            stuck_after: env_minutes("IPG_STUCK_INVOICE_MINUTES", DEFAULT_STUCK_AFTER),
            user_email_grace: env_minutes("IPG_USER_EMAIL_GRACE_MINUTES", DEFAULT_USER_EMAIL_GRACE),
            escalation_cooldown,
        }
    }

    /// Refuses to start without the credentials the server cannot work without.
    pub fn check_required(&self) -> Result<(), ConfigError> {
        self.gateway.check()?;
        self.mailer.check()?;
        self.price_feeds.check()?;
        self.webhook.check()
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            stuck_after: self.stuck_after,
            user_email_grace: self.user_email_grace,
            escalation_cooldown: self.escalation_cooldown,
            gateway_retry: RetryPolicy::default().with_max_attempts(self.gateway.max_attempts),
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let secret = Secret::from_env("IPG_WEBHOOK_SECRET");
        let signature_header = env::var("IPG_WEBHOOK_SIGNATURE_HEADER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let allow_unsigned = env_flag("IPG_ALLOW_UNSIGNED_WEBHOOKS", false);
        if allow_unsigned {
            warn!(
                "🚨️ IPG_ALLOW_UNSIGNED_WEBHOOKS is on. Webhooks without a valid signature will be accepted. Anyone who \
                 can reach this server can report an invoice as paid whenever the gateway cannot be polled."
            );
        }
        if secret.is_unset() && !allow_unsigned {
            error!("🪛️ IPG_WEBHOOK_SECRET is not set. Every webhook will be rejected.");
        }
        Self { secret, signature_header, allow_unsigned }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.secret.is_unset() && !self.allow_unsigned {
            return Err(ConfigError::MissingValue("IPG_WEBHOOK_SECRET"));
        }
        Ok(())
    }
}
