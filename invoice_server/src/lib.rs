//! # Invoice payment gateway server
//! This crate hosts the HTTP front end of the invoice payment gateway. It is responsible for:
//! * Receiving webhook callbacks from the payment gateway and checking their signatures.
//! * Answering status checks for an invoice.
//! * Recording newly issued invoices.
//!
//! Every status signal is handed to the reconciliation engine in [`invoice_engine`], which owns the ledger and all
//! the side effects.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook`: Gateway callbacks. Signed with an HMAC of the body.
//! * `/invoice/{invoice_id}/status`: The reconciled state of an invoice.
//! * `/invoice`: Create an invoice.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
