use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use hyliya_db::queries::friends::RequestOutcome;
use hyliya_db::ts;
use hyliya_types::api::{Claims, FriendEntry, FriendRequestBody, PendingRequestEntry};
use hyliya_types::events::GatewayEvent;

use crate::profiles::to_summary;
use crate::state::AppState;

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendRequestBody>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.user_id == claims.sub {
        return Err(StatusCode::BAD_REQUEST);
    }

    let outcome = state
        .db
        .send_friend_request(
            &claims.sub.to_string(),
            &req.user_id.to_string(),
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    match outcome {
        RequestOutcome::TargetMissing => Err(StatusCode::NOT_FOUND),
        RequestOutcome::Duplicate => Err(StatusCode::CONFLICT),
        RequestOutcome::Sent => {
            state
                .dispatcher
                .send_to_user(
                    req.user_id,
                    GatewayEvent::FriendRequest {
                        from_user_id: claims.sub,
                        from_name: claims.username.clone(),
                    },
                )
                .await;
            Ok(StatusCode::CREATED)
        }
    }
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(from_user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let accepted = state
        .db
        .accept_friend_request(
            &claims.sub.to_string(),
            &from_user_id.to_string(),
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !accepted {
        return Err(StatusCode::NOT_FOUND);
    }

    state
        .dispatcher
        .send_to_user(
            from_user_id,
            GatewayEvent::FriendAccepted {
                by_user_id: claims.sub,
                by_name: claims.username.clone(),
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a pending request between the caller and the given user —
/// declining an incoming request and cancelling an outgoing one are the
/// same operation.
pub async fn remove_request(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let removed = state
        .db
        .remove_pending_request(&claims.sub.to_string(), &user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfriend(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let removed = state
        .db
        .unfriend(&claims.sub.to_string(), &user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = state
        .db
        .list_friends(&claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let friends: Vec<FriendEntry> = rows
        .into_iter()
        .map(|row| FriendEntry {
            user: to_summary(row.user),
            since: hyliya_db::parse_ts(&row.since),
        })
        .collect();

    Ok(Json(friends))
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = state
        .db
        .list_pending_requests(&claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let pending: Vec<PendingRequestEntry> = rows
        .into_iter()
        .map(|row| PendingRequestEntry {
            user: to_summary(row.user),
            requested_at: hyliya_db::parse_ts(&row.requested_at),
        })
        .collect();

    Ok(Json(pending))
}
