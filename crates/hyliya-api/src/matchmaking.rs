use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use hyliya_db::queries::matchmaking::PollOutcome;
use hyliya_db::ts;
use hyliya_types::api::{Claims, QueueStateResponse};
use hyliya_types::events::GatewayEvent;

use crate::parse_uuid;
use crate::profiles::full_to_summary;
use crate::state::AppState;

/// Join the stranger queue. Idempotent — re-joining while waiting returns
/// the same waiting state.
pub async fn join_queue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = state
        .db
        .join_queue(&claims.sub.to_string(), &ts(chrono::Utc::now()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(QueueStateResponse {
        status: row.status,
        conversation_id: None,
        partner: None,
    }))
}

/// One matchmaking poll. Clients call this on an interval (~1.5s) while on
/// the stranger-chat screen.
pub async fn poll_queue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let outcome = state
        .db
        .poll_queue(&claims.sub.to_string(), &ts(chrono::Utc::now()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let (conversation_id, partner_id) = match outcome {
        PollOutcome::NotQueued => {
            return Ok(Json(QueueStateResponse {
                status: "idle".into(),
                conversation_id: None,
                partner: None,
            }));
        }
        PollOutcome::Waiting => {
            return Ok(Json(QueueStateResponse {
                status: "waiting".into(),
                conversation_id: None,
                partner: None,
            }));
        }
        PollOutcome::Matched {
            conversation_id,
            partner_id,
        } => (conversation_id, partner_id),
    };

    let partner = state
        .db
        .get_profile(&partner_id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let conversation_uuid = parse_uuid(&conversation_id, "conversation id");
    let partner_uuid = parse_uuid(&partner_id, "profile id");

    // The partner may still be sitting on the waiting screen; push the match
    // so they don't have to wait for their next poll. The claimer gets a
    // copy too, for clients driven purely by gateway events.
    state
        .dispatcher
        .send_to_user(
            partner_uuid,
            GatewayEvent::MatchFound {
                conversation_id: conversation_uuid,
                partner_id: claims.sub,
                partner_name: claims.username.clone(),
                origin: "stranger".into(),
            },
        )
        .await;
    state
        .dispatcher
        .send_to_user(
            claims.sub,
            GatewayEvent::MatchFound {
                conversation_id: conversation_uuid,
                partner_id: partner_uuid,
                partner_name: partner
                    .as_ref()
                    .map(|p| p.display_name.clone())
                    .unwrap_or_default(),
                origin: "stranger".into(),
            },
        )
        .await;

    Ok(Json(QueueStateResponse {
        status: "matched".into(),
        conversation_id: Some(conversation_uuid),
        partner: partner.map(|p| full_to_summary(&p)),
    }))
}

/// Leave the queue (cancel or navigating away). Idempotent.
pub async fn leave_queue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .db
        .leave_queue(&claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(StatusCode::NO_CONTENT)
}
