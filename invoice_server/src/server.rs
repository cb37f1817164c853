use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::{GatewayApi, MailerApi, PriceFeed};
use invoice_engine::{EngineOptions, PriceOracle, ReconciliationApi, SqliteDatabase};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{gateway::GatewayPoller, mailer::EmailNotifier, price_feeds::FeedSource},
    middleware::HmacMiddlewareFactory,
    routes::{health, CreateInvoiceRoute, InvoiceStatusRoute, WebhookRoute},
};

pub type LiveApi = ReconciliationApi<SqliteDatabase, GatewayPoller, EmailNotifier, FeedSource>;

/// Everything the request handlers share. Cloning is cheap; clones share connection pools and the price cache.
#[derive(Clone)]
pub struct Collaborators {
    pub db: SqliteDatabase,
    pub gateway: GatewayPoller,
    pub notifier: EmailNotifier,
    pub oracle: PriceOracle<FeedSource>,
    pub options: EngineOptions,
}

impl Collaborators {
    pub fn reconciliation_api(&self) -> LiveApi {
        ReconciliationApi::new(
            self.db.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            self.oracle.clone(),
            self.options.clone(),
        )
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.check_required()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migrations failed. {e}")))?;
    let gateway = GatewayPoller::new(GatewayApi::new(config.gateway.clone())?);
    let notifier = EmailNotifier::new(MailerApi::new(config.mailer.clone())?);
    let feeds = PriceFeed::from_config(&config.price_feeds)?.into_iter().map(FeedSource).collect::<Vec<_>>();
    let oracle = PriceOracle::new(feeds, config.price_feeds.ttl);
    let collaborators = Collaborators { db, gateway, notifier, oracle, options: config.engine_options() };
    let srv = create_server_instance(config, collaborators)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, collaborators: Collaborators) -> Result<Server, ServerError> {
    if config.webhook.allow_unsigned {
        warn!("🚨️ Unsigned webhooks are allowed. Do not run like this in production.");
    }
    let webhook_config = config.webhook.clone();
    let srv = HttpServer::new(move || {
        let api = collaborators.reconciliation_api();
        let hmac = HmacMiddlewareFactory::new(
            &webhook_config.signature_header,
            webhook_config.secret.clone(),
            webhook_config.allow_unsigned,
        );
        let webhook_scope = web::scope("/webhook")
            .wrap(hmac)
            .service(WebhookRoute::<SqliteDatabase, GatewayPoller, EmailNotifier, FeedSource>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ipg::access_log"))
            .app_data(web::Data::new(api))
            .service(health)
            .service(webhook_scope)
            .service(InvoiceStatusRoute::<SqliteDatabase, GatewayPoller, EmailNotifier, FeedSource>::new())
            .service(CreateInvoiceRoute::<SqliteDatabase, GatewayPoller, EmailNotifier, FeedSource>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}
