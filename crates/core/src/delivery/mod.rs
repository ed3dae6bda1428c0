//! Webhook delivery: retry policy, engine and transport port

pub mod engine;
pub mod ports;

pub use engine::{DeliveryEngine, RetryPolicy};
pub use ports::{WebhookResponse, WebhookTransport};
