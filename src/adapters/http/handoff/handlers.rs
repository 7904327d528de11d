//! HTTP handlers for hand-off endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::middleware::OperatorContext;
use crate::application::handlers::handoff::{
    GetControlStateError, GetControlStateHandler, GetControlStateQuery, ReleaseControlCommand,
    ReleaseControlError, ReleaseControlHandler, SendOperatorMessageCommand,
    SendOperatorMessageError, SendOperatorMessageHandler, TakeControlCommand, TakeControlError,
    TakeControlHandler,
};
use crate::domain::foundation::ConversationId;
use crate::ports::{ConversationStore, DeliveryGateway, EventPublisher, MessageStore};

use super::dto::{
    ControlStateResponse, ErrorResponse, HoldResponse, MessageSentResponse, ReleaseRequest,
    ReleaseResponse, SendMessageRequest, TakeoverRequest,
};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

pub struct HandoffHandlers<S, M, G, P>
where
    S: ConversationStore,
    M: MessageStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    take_handler: Arc<TakeControlHandler<S, G, P>>,
    send_handler: Arc<SendOperatorMessageHandler<S, M, G, P>>,
    release_handler: Arc<ReleaseControlHandler<S, G, P>>,
    control_state_handler: Arc<GetControlStateHandler<S>>,
}

impl<S, M, G, P> HandoffHandlers<S, M, G, P>
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        take_handler: Arc<TakeControlHandler<S, G, P>>,
        send_handler: Arc<SendOperatorMessageHandler<S, M, G, P>>,
        release_handler: Arc<ReleaseControlHandler<S, G, P>>,
        control_state_handler: Arc<GetControlStateHandler<S>>,
    ) -> Self {
        Self {
            take_handler,
            send_handler,
            release_handler,
            control_state_handler,
        }
    }
}

// Hand-written so the adapters themselves don't need to be Clone.
impl<S, M, G, P> Clone for HandoffHandlers<S, M, G, P>
where
    S: ConversationStore,
    M: MessageStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    fn clone(&self) -> Self {
        Self {
            take_handler: Arc::clone(&self.take_handler),
            send_handler: Arc::clone(&self.send_handler),
            release_handler: Arc::clone(&self.release_handler),
            control_state_handler: Arc::clone(&self.control_state_handler),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/conversations/:id/takeover - Take manual control
pub async fn take_control<S, M, G, P>(
    State(handlers): State<HandoffHandlers<S, M, G, P>>,
    context: OperatorContext,
    Path(conversation_id): Path<String>,
    Json(req): Json<TakeoverRequest>,
) -> Response
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    let conversation_id = match conversation_id.parse::<ConversationId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Invalid conversation ID")),
            )
                .into_response()
        }
    };

    let mut cmd = TakeControlCommand::new(context.tenant_id, conversation_id, context.operator_id);
    if let Some(minutes) = req.duration_minutes {
        cmd = cmd.with_duration_minutes(minutes);
    }
    if req.notify == Some(false) {
        cmd = cmd.without_notice();
    }

    match handlers.take_handler.handle(cmd).await {
        Ok(result) => {
            let response: HoldResponse = result.into();
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => handle_take_error(e),
    }
}

/// POST /api/conversations/:id/release - Hand control back to the assistant
pub async fn release_control<S, M, G, P>(
    State(handlers): State<HandoffHandlers<S, M, G, P>>,
    context: OperatorContext,
    Path(conversation_id): Path<String>,
    Json(req): Json<ReleaseRequest>,
) -> Response
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    let conversation_id = match conversation_id.parse::<ConversationId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Invalid conversation ID")),
            )
                .into_response()
        }
    };

    let mut cmd = ReleaseControlCommand::by_operator(
        context.tenant_id,
        conversation_id,
        context.operator_id,
    );
    if req.notify == Some(false) {
        cmd = cmd.without_notice();
    }

    match handlers.release_handler.handle(cmd).await {
        Ok(result) => {
            let response: ReleaseResponse = result.into();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_release_error(e),
    }
}

/// POST /api/conversations/:id/messages - Send an operator message
pub async fn send_message<S, M, G, P>(
    State(handlers): State<HandoffHandlers<S, M, G, P>>,
    context: OperatorContext,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Response
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    let conversation_id = match conversation_id.parse::<ConversationId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Invalid conversation ID")),
            )
                .into_response()
        }
    };

    let mut cmd = SendOperatorMessageCommand::new(
        context.tenant_id,
        conversation_id,
        context.operator_id,
        req.body,
    );
    if req.extend == Some(false) {
        cmd = cmd.without_extension();
    }

    match handlers.send_handler.handle(cmd).await {
        Ok(result) => {
            let response: MessageSentResponse = result.into();
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => handle_send_error(e),
    }
}

/// GET /api/conversations/:id/control - Current control state
pub async fn get_control<S, M, G, P>(
    State(handlers): State<HandoffHandlers<S, M, G, P>>,
    context: OperatorContext,
    Path(conversation_id): Path<String>,
) -> Response
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    let conversation_id = match conversation_id.parse::<ConversationId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Invalid conversation ID")),
            )
                .into_response()
        }
    };

    let query = GetControlStateQuery {
        tenant_id: context.tenant_id,
        conversation_id,
    };

    match handlers.control_state_handler.handle(query).await {
        Ok(view) => {
            let response: ControlStateResponse = view.into();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_control_state_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn handle_take_error(error: TakeControlError) -> Response {
    match error {
        TakeControlError::AlreadyManual { holder_id } => (
            StatusCode::CONFLICT,
            Json(
                ErrorResponse::conflict("Conversation is already under manual control")
                    .with_details(serde_json::json!({ "holderId": holder_id })),
            ),
        )
            .into_response(),
        TakeControlError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Conversation", &id.to_string())),
        )
            .into_response(),
        TakeControlError::Validation(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::validation_failed(message)),
        )
            .into_response(),
        TakeControlError::StoreError(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(message)),
        )
            .into_response(),
    }
}

fn handle_send_error(error: SendOperatorMessageError) -> Response {
    match error {
        SendOperatorMessageError::EmptyBody => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::validation_failed(
                "Message body cannot be empty",
            )),
        )
            .into_response(),
        SendOperatorMessageError::BodyTooLong {
            max_chars,
            actual_chars,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::validation_failed(format!(
                "Message body of {} characters exceeds the limit of {}",
                actual_chars, max_chars
            ))),
        )
            .into_response(),
        SendOperatorMessageError::NotManual => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::conflict(
                "Conversation is not under manual control",
            )),
        )
            .into_response(),
        SendOperatorMessageError::HoldExpired => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::conflict("The manual hold has expired")),
        )
            .into_response(),
        SendOperatorMessageError::NotHolder { holder_id } => (
            StatusCode::FORBIDDEN,
            Json(
                ErrorResponse::forbidden("Conversation is held by another operator")
                    .with_details(serde_json::json!({ "holderId": holder_id })),
            ),
        )
            .into_response(),
        SendOperatorMessageError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Conversation", &id.to_string())),
        )
            .into_response(),
        SendOperatorMessageError::ChannelUnresolvable => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::conflict(
                "Conversation has no channel address",
            )),
        )
            .into_response(),
        SendOperatorMessageError::DeliveryFailed(message) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::delivery_failed(message)),
        )
            .into_response(),
        SendOperatorMessageError::DeliveredButNotRecorded {
            external_message_id,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(
                ErrorResponse::internal(
                    "Message was delivered but could not be recorded; do not retry",
                )
                .with_details(serde_json::json!({
                    "externalMessageId": external_message_id
                })),
            ),
        )
            .into_response(),
        SendOperatorMessageError::StoreError(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(message)),
        )
            .into_response(),
    }
}

fn handle_release_error(error: ReleaseControlError) -> Response {
    match error {
        ReleaseControlError::NotManual => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::conflict(
                "Conversation is not under manual control",
            )),
        )
            .into_response(),
        ReleaseControlError::NotHolder { holder_id, .. } => (
            StatusCode::FORBIDDEN,
            Json(
                ErrorResponse::forbidden("Conversation is held by another operator")
                    .with_details(serde_json::json!({ "holderId": holder_id })),
            ),
        )
            .into_response(),
        ReleaseControlError::HoldChanged => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::conflict(
                "The manual hold changed while releasing",
            )),
        )
            .into_response(),
        ReleaseControlError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Conversation", &id.to_string())),
        )
            .into_response(),
        ReleaseControlError::StoreError(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(message)),
        )
            .into_response(),
    }
}

fn handle_control_state_error(error: GetControlStateError) -> Response {
    match error {
        GetControlStateError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Conversation", &id.to_string())),
        )
            .into_response(),
        GetControlStateError::StoreError(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(message)),
        )
            .into_response(),
    }
}
