//! Caller-context extractor for axum.
//!
//! Operators reach this service through an edge proxy that has already
//! authenticated them. The proxy forwards the caller's identity in two
//! headers:
//!
//! ```text
//! X-Tandem-Tenant:   550e8400-e29b-41d4-a716-446655440000
//! X-Tandem-Operator: op-7f3a
//! ```
//!
//! `OperatorContext` turns those headers into typed identifiers, so no
//! handler ever touches raw header values. Requests missing either
//! header are rejected with 401; malformed values with 400.
//!
//! # Example
//!
//! ```ignore
//! async fn my_handler(context: OperatorContext) -> String {
//!     format!("tenant {} operator {}", context.tenant_id, context.operator_id)
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::{OperatorId, TenantId};

/// Header carrying the tenant UUID.
pub const TENANT_HEADER: &str = "x-tandem-tenant";

/// Header carrying the operator identifier.
pub const OPERATOR_HEADER: &str = "x-tandem-operator";

/// The authenticated caller, as forwarded by the edge proxy.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub tenant_id: TenantId,
    pub operator_id: OperatorId,
}

impl<S> axum::extract::FromRequestParts<S> for OperatorContext
where
    S: Send + Sync,
{
    type Rejection = ContextRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let tenant_value = parts
                .headers
                .get(TENANT_HEADER)
                .ok_or(ContextRejection::MissingTenant)?
                .to_str()
                .map_err(|_| ContextRejection::InvalidTenant)?;
            let tenant_id = tenant_value
                .parse::<TenantId>()
                .map_err(|_| ContextRejection::InvalidTenant)?;

            let operator_value = parts
                .headers
                .get(OPERATOR_HEADER)
                .ok_or(ContextRejection::MissingOperator)?
                .to_str()
                .map_err(|_| ContextRejection::InvalidOperator)?;
            let operator_id = OperatorId::new(operator_value)
                .map_err(|_| ContextRejection::InvalidOperator)?;

            Ok(OperatorContext {
                tenant_id,
                operator_id,
            })
        })
    }
}

/// Rejection type for caller-context failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRejection {
    /// The tenant header is absent.
    MissingTenant,
    /// The operator header is absent.
    MissingOperator,
    /// The tenant header is not a UUID.
    InvalidTenant,
    /// The operator header is empty or not valid text.
    InvalidOperator,
}

impl IntoResponse for ContextRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ContextRejection::MissingTenant => (
                StatusCode::UNAUTHORIZED,
                "Tenant header required",
            ),
            ContextRejection::MissingOperator => (
                StatusCode::UNAUTHORIZED,
                "Operator header required",
            ),
            ContextRejection::InvalidTenant => (
                StatusCode::BAD_REQUEST,
                "Tenant header must be a UUID",
            ),
            ContextRejection::InvalidOperator => (
                StatusCode::BAD_REQUEST,
                "Operator header must be a non-empty identifier",
            ),
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "code": "CALLER_CONTEXT"
            })),
        )
            .into_response()
    }
}
