//! Channel gateway adapters.
//!
//! Outbound delivery to the messaging platform the customer is on.

mod http;

pub use http::{HttpDeliveryGateway, HttpGatewayConfig};
