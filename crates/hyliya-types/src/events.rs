use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A new message was posted in a conversation
    MessageCreate {
        id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// A user started typing in a conversation
    TypingStart {
        conversation_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    /// The user was paired into a conversation (stranger queue or mutual swipe)
    MatchFound {
        conversation_id: Uuid,
        partner_id: Uuid,
        partner_name: String,
        origin: String,
    },

    /// Someone sent the user a friend request
    FriendRequest {
        from_user_id: Uuid,
        from_name: String,
    },

    /// A friend request the user sent was accepted
    FriendAccepted {
        by_user_id: Uuid,
        by_name: String,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },
}

impl GatewayEvent {
    /// Returns the conversation_id if this event is scoped to a conversation.
    /// Events that return `None` are global or targeted and bypass the
    /// per-connection subscription filter.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { conversation_id, .. } => Some(*conversation_id),
            Self::TypingStart { conversation_id, .. } => Some(*conversation_id),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to conversation-scoped events.
    /// The server only forwards MessageCreate/TypingStart for subscribed
    /// conversations.
    Subscribe { conversation_ids: Vec<Uuid> },

    /// Indicate typing in a conversation
    StartTyping { conversation_id: Uuid },
}
