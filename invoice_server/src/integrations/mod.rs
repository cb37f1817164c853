//! Adapters that plug the HTTP clients from `gateway_tools` into the engine's collaborator traits.
pub mod gateway;
pub mod mailer;
pub mod price_feeds;
