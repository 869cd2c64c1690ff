//! Saved conversations of registered users.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::{ConversationStore, MessageStore};
use crate::error::ServerError;
use crate::handlers::account;
use crate::middleware::AuthUser;
use crate::routes::api::ValidatedJson;
use crate::schemas::api::saved::{
    ConversationMessagesResponse, MessageView, SaveChatRequest, SaveChatResponse, SavedChatView, SavedChatsResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(save_chat, saved_chats, conversation_messages),
    components(schemas(
        SaveChatRequest,
        SaveChatResponse,
        SavedChatsResponse,
        SavedChatView,
        ConversationMessagesResponse,
        MessageView
    ))
)]
pub struct SavedApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/save-chat", post(save_chat))
        .route("/saved-chats", get(saved_chats))
        .route("/conversations/{id}/messages", get(conversation_messages))
}

/// Save a conversation (`POST /api/save-chat`).
#[utoipa::path(
    post,
    path = "/api/save-chat",
    tag = "saved",
    security(("bearer" = [])),
    request_body = SaveChatRequest,
    responses(
        (status = 200, description = "Conversation saved", body = SaveChatResponse),
        (status = 400, description = "No conversation identifier"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Conversation not found"),
    )
)]
pub async fn save_chat(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<SaveChatRequest>,
) -> Result<Json<SaveChatResponse>, ServerError> {
    let conversation =
        account::find_conversation(&state, req.conversation_id.as_deref(), req.session_id.as_deref()).await?;
    let saved_at = account::save_chat(&state, &user, conversation, req.message_count).await?;
    Ok(Json(SaveChatResponse {
        success: true,
        message: "Chat saved successfully".into(),
        saved_at,
    }))
}

/// List the caller's saved conversations (`GET /api/saved-chats`).
#[utoipa::path(
    get,
    path = "/api/saved-chats",
    tag = "saved",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Saved conversations, newest first", body = SavedChatsResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn saved_chats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<SavedChatsResponse>, ServerError> {
    let chats = state.store.saved_chats(&user.id).await?;
    Ok(Json(SavedChatsResponse {
        success: true,
        chats: chats.into_iter().map(SavedChatView::from).collect(),
    }))
}

/// Messages of one of the caller's conversations.
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "saved",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages in order", body = ConversationMessagesResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Conversation not found"),
    )
)]
pub async fn conversation_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ConversationMessagesResponse>, ServerError> {
    state
        .store
        .get_conversation(&id)
        .await?
        .filter(|c| c.user_id.as_deref() == Some(user.id.as_str()))
        .ok_or_else(|| ServerError::NotFound(format!("conversation {id} not found")))?;

    let messages = state.store.list_messages(&id).await?;
    Ok(Json(ConversationMessagesResponse {
        success: true,
        conversation_id: id,
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}
