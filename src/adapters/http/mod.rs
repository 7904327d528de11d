//! HTTP adapters - REST API implementations.
//!
//! The hand-off endpoints live here, together with the caller-context
//! extractor the edge proxy feeds.

pub mod handoff;
pub mod middleware;

// Re-export key types for convenience
pub use handoff::handoff_routes;
pub use handoff::HandoffHandlers;
pub use middleware::OperatorContext;
