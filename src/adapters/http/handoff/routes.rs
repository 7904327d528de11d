//! HTTP routes for hand-off endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::ports::{ConversationStore, DeliveryGateway, EventPublisher, MessageStore};

use super::handlers::{
    get_control, release_control, send_message, take_control, HandoffHandlers,
};

/// Creates the hand-off router with all endpoints.
///
/// Paths are relative; main nests this under `/api/conversations`.
pub fn handoff_routes<S, M, G, P>(handlers: HandoffHandlers<S, M, G, P>) -> Router
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    Router::new()
        .route("/:id/takeover", post(take_control))
        .route("/:id/release", post(release_control))
        .route("/:id/messages", post(send_message))
        .route("/:id/control", get(get_control))
        .with_state(handlers)
}
