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
use hyliya_types::api::{
    Claims, CommentResponse, CreateCommentRequest, CreatePostRequest, CreateStoryRequest,
    PostResponse, StoryResponse,
};

use crate::parse_uuid;
use crate::profiles::to_summary;
use crate::state::AppState;

const MAX_POST_LEN: usize = 8000;
const MAX_COMMENT_LEN: usize = 2000;

/// Stories disappear 24 hours after posting.
const STORY_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    20
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() || req.content.len() > MAX_POST_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let post_id = Uuid::new_v4();
    state
        .db
        .create_post(
            &post_id.to_string(),
            &claims.sub.to_string(),
            &req.content,
            req.image_url.as_deref(),
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": post_id }))))
}

pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let viewer = claims.sub.to_string();
    let limit = query.limit.min(100);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || db.db.feed(&viewer, limit, before.as_deref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let posts: Vec<PostResponse> = rows
        .into_iter()
        .map(|row| PostResponse {
            id: parse_uuid(&row.id, "post id"),
            author: to_summary(row.author),
            content: row.content,
            image_url: row.image_url,
            like_count: row.like_count.max(0) as u32,
            comment_count: row.comment_count.max(0) as u32,
            liked_by_me: row.liked_by_me,
            created_at: hyliya_db::parse_ts(&row.created_at),
        })
        .collect();

    Ok(Json(posts))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let removed = state
        .db
        .delete_post(&post_id.to_string(), &claims.sub.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let added = state
        .db
        .toggle_like(
            &post_id.to_string(),
            &claims.sub.to_string(),
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({ "liked": added })))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() || req.content.len() > MAX_COMMENT_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let comment_id = Uuid::new_v4();
    let created = state
        .db
        .create_comment(
            &comment_id.to_string(),
            &post_id.to_string(),
            &claims.sub.to_string(),
            &req.content,
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !created {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": comment_id }))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = state
        .db
        .list_comments(&post_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let comments: Vec<CommentResponse> = rows
        .into_iter()
        .map(|row| CommentResponse {
            id: parse_uuid(&row.id, "comment id"),
            post_id: parse_uuid(&row.post_id, "post id"),
            author: to_summary(row.author),
            content: row.content,
            created_at: hyliya_db::parse_ts(&row.created_at),
        })
        .collect();

    Ok(Json(comments))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.media_url.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let story_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    state
        .db
        .create_story(
            &story_id.to_string(),
            &claims.sub.to_string(),
            &req.media_url,
            &ts(now),
            &ts(now + chrono::Duration::hours(STORY_TTL_HOURS)),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": story_id }))))
}

pub async fn list_stories(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = state
        .db
        .list_stories(&ts(chrono::Utc::now()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let stories: Vec<StoryResponse> = rows
        .into_iter()
        .map(|row| StoryResponse {
            id: parse_uuid(&row.id, "story id"),
            author: to_summary(row.author),
            media_url: row.media_url,
            created_at: hyliya_db::parse_ts(&row.created_at),
            expires_at: hyliya_db::parse_ts(&row.expires_at),
        })
        .collect();

    Ok(Json(stories))
}
