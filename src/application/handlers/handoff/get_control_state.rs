//! GetControlState query handler.
//!
//! Read model behind the operator console's control panel. After a
//! rejected take-over the console refreshes from here instead of
//! retrying blindly, so the view names the current holder and whether
//! the hold has already lapsed.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::foundation::{ConversationId, DomainError, OperatorId, TenantId, Timestamp};
use crate::ports::ConversationStore;

/// Query for the current control state of a conversation.
#[derive(Debug, Clone)]
pub struct GetControlStateQuery {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
}

/// Errors that can occur when reading control state.
#[derive(Debug, Clone, Error)]
pub enum GetControlStateError {
    /// Conversation does not exist in this tenant.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Store error during the read.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<DomainError> for GetControlStateError {
    fn from(err: DomainError) -> Self {
        GetControlStateError::StoreError(err.to_string())
    }
}

/// Snapshot of a conversation's control state.
///
/// Expiry is lazy: a lapsed hold stays on the row until the worker
/// reclaims it, so the manual view carries an `expired` flag computed
/// at read time.
#[derive(Debug, Clone)]
pub enum ControlStateView {
    Automated,
    Manual {
        holder_id: OperatorId,
        started_at: Timestamp,
        expires_at: Timestamp,
        expired: bool,
    },
}

/// Handler for GetControlState queries.
pub struct GetControlStateHandler<S>
where
    S: ConversationStore,
{
    store: Arc<S>,
}

impl<S> GetControlStateHandler<S>
where
    S: ConversationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: GetControlStateQuery,
    ) -> Result<ControlStateView, GetControlStateError> {
        let conversation = self
            .store
            .find(&query.tenant_id, &query.conversation_id)
            .await?
            .ok_or(GetControlStateError::ConversationNotFound(
                query.conversation_id,
            ))?;

        let view = match conversation.control().as_manual() {
            Some(hold) => ControlStateView::Manual {
                holder_id: hold.holder().clone(),
                started_at: hold.started_at(),
                expires_at: hold.expires_at(),
                expired: hold.is_expired_at(&Timestamp::now()),
            },
            None => ControlStateView::Automated,
        };
        Ok(view)
    }
}
