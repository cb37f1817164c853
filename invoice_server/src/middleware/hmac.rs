//! HMAC middleware for Actix Web.
//!
//! The payment gateway signs every webhook with an HMAC-SHA256 of the raw request body, keyed with
//! `IPG_WEBHOOK_SECRET`, and sends it in the `X-Gateway-Signature` header (configurable). Hex and base64 encodings are
//! both accepted.
//!
//! Requests with a bad signature are always rejected. Requests with no signature are rejected too, unless unsigned
//! webhooks have been explicitly allowed. Either way, the handler finds a [`SignatureVerified`] marker in the request
//! extensions, and only trusts the payload's customer details if it is `true`.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use ipg_common::Secret;
use log::{trace, warn};

use crate::helpers::verify_hmac;

/// Whether the body of this request carried a valid signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerified(pub bool);

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    key: Secret<String>,
    allow_unsigned: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>, allow_unsigned: bool) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), key, allow_unsigned }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            key: self.key.clone(),
            allow_unsigned: self.allow_unsigned,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    key: Secret<String>,
    allow_unsigned: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.clone();
        let hmac_header = self.hmac_header.clone();
        let allow_unsigned = self.allow_unsigned;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = req.headers().get(&hmac_header).and_then(|v| v.to_str().ok()).map(str::to_string);
            let verified = match (signature, key.is_unset()) {
                (Some(sig), false) => {
                    if verify_hmac(key.reveal(), data.as_ref(), &sig) {
                        trace!("🔐️ Webhook signature ✅️");
                        true
                    } else {
                        warn!("🔐️ Invalid webhook signature. Denying access.");
                        return Err(ErrorForbidden("Invalid webhook signature."));
                    }
                },
                (_, _) if allow_unsigned => {
                    warn!(
                        "🚨️ Accepting an unverified webhook because IPG_ALLOW_UNSIGNED_WEBHOOKS is on. Its metadata \
                         will be ignored."
                    );
                    false
                },
                (None, false) => {
                    warn!("🔐️ No signature found in the {hmac_header} header. Denying access.");
                    return Err(ErrorForbidden("No webhook signature found."));
                },
                (_, true) => {
                    warn!("🔐️ No webhook secret is configured, so the signature cannot be checked. Denying access.");
                    return Err(ErrorForbidden("Webhook signatures cannot be checked."));
                },
            };
            req.extensions_mut().insert(SignatureVerified(verified));
            req.set_payload(bytes_to_payload(data));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
