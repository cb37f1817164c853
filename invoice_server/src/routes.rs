//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler is async. Reconciliation waits on the gateway, the ledger and the mail provider, and none of that may
//! block a worker thread.
use actix_web::{get, web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use invoice_engine::{
    db_types::{InvoiceId, NewInvoice},
    traits::{GatewayPoll, LedgerStore, Notifier, PriceSource},
    ReconciliationApi,
    ResolvedView,
    SignalSource,
    WebhookPayload,
};
use log::*;
use serde_json::Value;

use crate::{
    data_objects::{NewInvoiceRequest, WebhookResponse},
    errors::ServerError,
    middleware::SignatureVerified,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
// Mounted inside the `/webhook` scope, behind the signature middleware.
route!(webhook => Post "" impl LedgerStore, GatewayPoll, Notifier, PriceSource);
/// Route handler for gateway callbacks.
///
/// The body may be any JSON object that names the invoice. The gateway is always polled for the authoritative
/// status; the payload's own status is only used when the poll fails, and its customer details only when the
/// signature was verified.
///
/// Any 2xx reply stops the gateway from redelivering, so a payload that can never be processed (no invoice key)
/// gets a 400, and a ledger outage gets a 503 so that the gateway tries again later.
pub async fn webhook<B, G, N, S>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, G, N, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerStore,
    G: GatewayPoll,
    N: Notifier,
    S: PriceSource,
{
    trace!("💻️ Received webhook request: {}", req.uri());
    let json = serde_json::from_slice::<Value>(&body).map_err(|e| {
        debug!("💻️ Webhook body is not JSON. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let verified = req.extensions().get::<SignatureVerified>().map(|v| v.0).unwrap_or(false);
    let payload = WebhookPayload::new(json, verified);
    let invoice_id = match payload.invoice_id() {
        Some(id) => id?,
        None => {
            info!("💻️ Webhook payload does not name an invoice. Ignoring it.");
            return Err(ServerError::MissingInvoiceKey("No invoice id found in the webhook payload".into()));
        },
    };
    debug!("💻️ Webhook for invoice {invoice_id} (verified: {verified})");
    let result = api.reconcile_with_outcome(&invoice_id, SignalSource::Webhook, Some(payload)).await?;
    let response = WebhookResponse {
        success: true,
        message: format!("Invoice {invoice_id}: {}", result.outcome),
        status: result.view.display_status,
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(invoice_status => Get "/invoice/{invoice_id}/status" impl LedgerStore, GatewayPoll, Notifier, PriceSource);
/// Reconciles an invoice on demand and returns the resolved view. Used by the checkout page while it waits for a
/// payment to land.
pub async fn invoice_status<B, G, N, S>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G, N, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerStore,
    G: GatewayPoll,
    N: Notifier,
    S: PriceSource,
{
    let invoice_id = path.into_inner().parse::<InvoiceId>()?;
    trace!("💻️ Status check for invoice {invoice_id}");
    let view = api.reconcile(&invoice_id, SignalSource::StatusCheck, None).await?;
    Ok(HttpResponse::Ok().json(view))
}

route!(create_invoice => Post "/invoice" impl LedgerStore, GatewayPoll, Notifier, PriceSource);
/// Records a newly issued invoice. Creating the same invoice twice is harmless: the second call returns the stored
/// invoice with a 200 instead of a 201.
pub async fn create_invoice<B, G, N, S>(
    body: web::Json<NewInvoiceRequest>,
    api: web::Data<ReconciliationApi<B, G, N, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerStore,
    G: GatewayPoll,
    N: Notifier,
    S: PriceSource,
{
    let invoice = NewInvoice::try_from(body.into_inner()).map_err(|e| {
        info!("💻️ Rejected new invoice. {e}");
        ServerError::ValidationError(e)
    })?;
    let (record, inserted) = api.ledger().open_invoice(invoice).await?;
    let view = ResolvedView::new(&record, api.monitor().display_status(&record, Utc::now()));
    if inserted {
        Ok(HttpResponse::Created().json(view))
    } else {
        Ok(HttpResponse::Ok().json(view))
    }
}
