use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use hyliya_db::models::{ProfileLiteRow, ProfileRow};
use hyliya_db::queries::profiles::ProfileUpdate;
use hyliya_types::api::{Claims, ProfileResponse, ProfileSummary, UpdateProfileRequest};

use crate::parse_uuid;
use crate::state::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = state
        .db
        .get_profile(&claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(to_profile_response(profile)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = state
        .db
        .get_profile(&user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(to_profile_response(profile)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if let Some(name) = &req.display_name {
        if name.trim().is_empty() || name.len() > 64 {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let interests = match &req.interests {
        Some(tags) => Some(
            serde_json::to_string(tags).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?,
        ),
        None => None,
    };

    let update = ProfileUpdate {
        display_name: req.display_name,
        bio: req.bio,
        gender: req.gender,
        birthdate: req.birthdate,
        city: req.city,
        interests,
        avatar_url: req.avatar_url,
    };

    let updated = state
        .db
        .update_profile(&claims.sub.to_string(), &update)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    let profile = state
        .db
        .get_profile(&claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(to_profile_response(profile)))
}

pub(crate) fn to_profile_response(row: ProfileRow) -> ProfileResponse {
    let interests: Vec<String> = serde_json::from_str(&row.interests).unwrap_or_else(|e| {
        warn!("Corrupt interests on profile '{}': {}", row.id, e);
        vec![]
    });

    ProfileResponse {
        id: parse_uuid(&row.id, "profile id"),
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        gender: row.gender,
        birthdate: row.birthdate,
        city: row.city,
        interests,
        avatar_url: row.avatar_url,
        is_premium: row.is_premium,
        premium_expires: row.premium_expires.as_deref().map(hyliya_db::parse_ts),
        created_at: hyliya_db::parse_ts(&row.created_at),
    }
}

pub(crate) fn to_summary(row: ProfileLiteRow) -> ProfileSummary {
    ProfileSummary {
        id: parse_uuid(&row.id, "profile id"),
        display_name: row.display_name,
        gender: row.gender,
        city: row.city,
        avatar_url: row.avatar_url,
        is_premium: row.is_premium,
    }
}

/// Summary straight from a full profile row, for handlers that already
/// fetched one.
pub(crate) fn full_to_summary(row: &ProfileRow) -> ProfileSummary {
    ProfileSummary {
        id: parse_uuid(&row.id, "profile id"),
        display_name: row.display_name.clone(),
        gender: row.gender.clone(),
        city: row.city.clone(),
        avatar_url: row.avatar_url.clone(),
        is_premium: row.is_premium,
    }
}
