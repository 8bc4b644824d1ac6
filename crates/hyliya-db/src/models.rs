/// Database row types — these map directly to SQLite rows.
/// Distinct from the hyliya-types API models to keep the DB layer independent.

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub city: Option<String>,
    /// JSON array of interest tags, stored verbatim.
    pub interests: String,
    pub avatar_url: Option<String>,
    pub is_fake: bool,
    pub is_premium: bool,
    pub premium_expires: Option<String>,
    pub created_at: String,
}

/// Compact profile columns joined into list queries.
pub struct ProfileLiteRow {
    pub id: String,
    pub display_name: String,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
}

impl ProfileLiteRow {
    /// Read the six lite columns starting at `offset` in a joined row.
    pub(crate) fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            display_name: row.get(offset + 1)?,
            gender: row.get(offset + 2)?,
            city: row.get(offset + 3)?,
            avatar_url: row.get(offset + 4)?,
            is_premium: row.get(offset + 5)?,
        })
    }

    /// The six columns `from_row` expects, qualified with a table alias.
    pub(crate) fn columns(alias: &str) -> String {
        format!(
            "{a}.id, {a}.display_name, {a}.gender, {a}.city, {a}.avatar_url, {a}.is_premium",
            a = alias
        )
    }
}

pub struct ConversationRow {
    pub id: String,
    pub partner: ProfileLiteRow,
    pub origin: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub author: ProfileLiteRow,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author: ProfileLiteRow,
    pub content: String,
    pub created_at: String,
}

pub struct StoryRow {
    pub id: String,
    pub author: ProfileLiteRow,
    pub media_url: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct FriendRow {
    pub user: ProfileLiteRow,
    pub since: String,
}

pub struct PendingRequestRow {
    pub user: ProfileLiteRow,
    pub requested_at: String,
}

pub struct QueueRow {
    pub user_id: String,
    pub status: String,
    pub conversation_id: Option<String>,
    pub joined_at: String,
}

pub struct InvoiceRow {
    pub order_code: i64,
    pub user_id: String,
    pub package_id: String,
    pub amount: i64,
    pub status: String,
    pub checkout_url: String,
    pub created_at: String,
    pub paid_at: Option<String>,
}
