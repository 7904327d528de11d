//! HTTP middleware for axum.
//!
//! This module contains middleware layers for cross-cutting concerns:
//!
//! - `operator_context` - Caller-context extractor fed by the edge proxy

pub mod operator_context;

pub use operator_context::{ContextRejection, OperatorContext, OPERATOR_HEADER, TENANT_HEADER};
