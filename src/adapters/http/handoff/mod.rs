//! HTTP adapter for hand-off endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    ControlStateResponse, ErrorResponse, HoldResponse, MessageSentResponse, ReleaseRequest,
    ReleaseResponse, SendMessageRequest, TakeoverRequest,
};
pub use handlers::HandoffHandlers;
pub use routes::handoff_routes;
