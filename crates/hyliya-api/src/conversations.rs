use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use hyliya_types::api::{Claims, ConversationResponse};

use crate::parse_uuid;
use crate::profiles::to_summary;
use crate::state::AppState;

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || db.db.list_conversations(&user_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let conversations: Vec<ConversationResponse> = rows
        .into_iter()
        .map(|row| ConversationResponse {
            id: parse_uuid(&row.id, "conversation id"),
            partner: to_summary(row.partner),
            origin: row.origin,
            last_message: row.last_message,
            last_message_at: row.last_message_at.as_deref().map(hyliya_db::parse_ts),
            created_at: hyliya_db::parse_ts(&row.created_at),
        })
        .collect();

    Ok(Json(conversations))
}

/// Clear the message history of a conversation. Participant-only; the
/// conversation itself stays so the pair doesn't get re-matched into a
/// duplicate later.
pub async fn delete_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let partner = state
        .db
        .conversation_partner(&conversation_id.to_string(), &claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if partner.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let deleted = state
        .db
        .delete_history(&conversation_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
