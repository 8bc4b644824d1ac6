use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use hyliya_db::ts;
use hyliya_types::api::{Claims, MessageResponse, SendMessageRequest};
use hyliya_types::events::GatewayEvent;

use crate::parse_uuid;
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() || req.content.len() > MAX_MESSAGE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Participant check before touching anything
    state
        .db
        .conversation_partner(&conversation_id.to_string(), &claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let message_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    // Run blocking DB insert off the async runtime
    let db = state.clone();
    let cid = conversation_id.to_string();
    let mid = message_id.to_string();
    let sid = claims.sub.to_string();
    let content = req.content.clone();
    let stamp = ts(now);
    tokio::task::spawn_blocking(move || db.db.insert_message(&mid, &cid, &sid, &content, &stamp))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Conversation-scoped broadcast; connections subscribed to this
    // conversation receive it
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id: message_id,
        conversation_id,
        sender_id: claims.sub,
        sender_name: claims.username.clone(),
        content: req.content.clone(),
        timestamp: now,
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            conversation_id,
            sender_id: claims.sub,
            content: req.content,
            created_at: now,
        }),
    ))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .db
        .conversation_partner(&conversation_id.to_string(), &claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let db = state.clone();
    let cid = conversation_id.to_string();
    let limit = query.limit.min(200);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || db.db.get_messages(&cid, limit, before.as_deref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse {
            id: parse_uuid(&row.id, "message id"),
            conversation_id: parse_uuid(&row.conversation_id, "conversation id"),
            sender_id: parse_uuid(&row.sender_id, "profile id"),
            content: row.content,
            created_at: hyliya_db::parse_ts(&row.created_at),
        })
        .collect();

    Ok(Json(messages))
}
