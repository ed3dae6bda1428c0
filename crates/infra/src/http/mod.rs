//! Outbound webhook HTTP

pub mod client;

pub use client::{ReqwestWebhookTransport, ReqwestWebhookTransportBuilder};
