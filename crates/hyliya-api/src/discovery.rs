use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::error;

use hyliya_db::queries::discovery::SwipeOutcome;
use hyliya_db::ts;
use hyliya_types::api::{Claims, ProfileSummary, SwipeRequest, SwipeResponse};
use hyliya_types::events::GatewayEvent;

use crate::parse_uuid;
use crate::profiles::to_summary;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

pub async fn discover(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let limit = query.limit.min(50);

    let rows = tokio::task::spawn_blocking(move || db.db.discover(&user_id, limit))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let deck: Vec<ProfileSummary> = rows.into_iter().map(to_summary).collect();
    Ok(Json(deck))
}

pub async fn swipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SwipeRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.target_id == claims.sub {
        return Err(StatusCode::BAD_REQUEST);
    }

    let now = ts(chrono::Utc::now());
    let outcome = state
        .db
        .record_swipe(
            &claims.sub.to_string(),
            &req.target_id.to_string(),
            req.liked,
            &now,
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let matched = match outcome {
        SwipeOutcome::TargetMissing => return Err(StatusCode::NOT_FOUND),
        SwipeOutcome::Duplicate | SwipeOutcome::Recorded { matched: None } => None,
        SwipeOutcome::Recorded { matched } => matched,
    };

    let Some(conversation_id) = matched else {
        return Ok(Json(SwipeResponse {
            matched: false,
            conversation_id: None,
        }));
    };

    let conversation_uuid = parse_uuid(&conversation_id, "conversation id");

    // Tell both sides. The swiper also gets it in the response; the target
    // only hears it through the gateway.
    let target = state
        .db
        .get_profile(&req.target_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let target_name = target
        .map(|p| p.display_name)
        .unwrap_or_else(|| "".to_string());

    state
        .dispatcher
        .send_to_user(
            req.target_id,
            GatewayEvent::MatchFound {
                conversation_id: conversation_uuid,
                partner_id: claims.sub,
                partner_name: claims.username.clone(),
                origin: "match".into(),
            },
        )
        .await;
    state
        .dispatcher
        .send_to_user(
            claims.sub,
            GatewayEvent::MatchFound {
                conversation_id: conversation_uuid,
                partner_id: req.target_id,
                partner_name: target_name,
                origin: "match".into(),
            },
        )
        .await;

    Ok(Json(SwipeResponse {
        matched: true,
        conversation_id: Some(conversation_uuid),
    }))
}
