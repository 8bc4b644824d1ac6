use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between hyliya-api (REST middleware) and hyliya-gateway
/// (WebSocket Identify handshake). Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Profiles --

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
    pub premium_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Compact profile used in lists (discovery, conversations, feed authors).
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub display_name: String,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub city: Option<String>,
    pub interests: Option<Vec<String>>,
    pub avatar_url: Option<String>,
}

// -- Discovery / swipes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwipeRequest {
    pub target_id: Uuid,
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub matched: bool,
    pub conversation_id: Option<Uuid>,
}

// -- Stranger matchmaking --

#[derive(Debug, Serialize)]
pub struct QueueStateResponse {
    /// "waiting" or "matched"
    pub status: String,
    pub conversation_id: Option<Uuid>,
    pub partner: Option<ProfileSummary>,
}

// -- Conversations & messages --

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub partner: ProfileSummary,
    pub origin: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Timeline --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: ProfileSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: u32,
    pub comment_count: u32,
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: ProfileSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStoryRequest {
    pub media_url: String,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub author: ProfileSummary,
    pub media_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendRequestBody {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FriendEntry {
    pub user: ProfileSummary,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestEntry {
    pub user: ProfileSummary,
    pub requested_at: DateTime<Utc>,
}

// -- Billing --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaymentRequest {
    pub package_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub order_code: i64,
    pub checkout_url: String,
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct InvoiceStatusResponse {
    pub order_code: i64,
    pub package_id: String,
    pub amount: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
}
