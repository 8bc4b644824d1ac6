use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

use super::OptionalExt;
use crate::Database;
use crate::models::{ConversationRow, MessageRow, ProfileLiteRow};

/// Find or create the conversation for an unordered pair of users.
///
/// The pair is stored canonically (`user_low < user_high`) under a UNIQUE
/// constraint, so two sides racing to create it converge on one row. Callers
/// that need atomicity with surrounding statements run this inside their own
/// transaction.
pub(crate) fn find_or_create_conversation(
    conn: &Connection,
    a: &str,
    b: &str,
    origin: &str,
    now: &str,
) -> Result<String> {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };

    conn.execute(
        "INSERT INTO conversations (id, user_low, user_high, origin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_low, user_high) DO NOTHING",
        rusqlite::params![Uuid::new_v4().to_string(), low, high, origin, now],
    )?;

    let id = conn.query_row(
        "SELECT id FROM conversations WHERE user_low = ?1 AND user_high = ?2",
        [low, high],
        |row| row.get(0),
    )?;

    Ok(id)
}

impl Database {
    pub fn create_conversation(&self, a: &str, b: &str, origin: &str, now: &str) -> Result<String> {
        self.with_conn_mut(|conn| find_or_create_conversation(conn, a, b, origin, now))
    }

    /// All of the user's conversations, most recent activity first, with the
    /// partner's profile joined in.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, {lite}, c.origin, c.last_message, c.last_message_at, c.created_at
                 FROM conversations c
                 JOIN profiles p
                   ON p.id = CASE WHEN c.user_low = ?1 THEN c.user_high ELSE c.user_low END
                 WHERE ?1 IN (c.user_low, c.user_high)
                 ORDER BY COALESCE(c.last_message_at, c.created_at) DESC",
                lite = ProfileLiteRow::columns("p"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        partner: ProfileLiteRow::from_row(row, 1)?,
                        origin: row.get(7)?,
                        last_message: row.get(8)?,
                        last_message_at: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns the partner's id if `user_id` participates in the
    /// conversation; None if the conversation doesn't exist or the user is
    /// not a participant.
    pub fn conversation_partner(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let pair: Option<(String, String)> = conn
                .query_row(
                    "SELECT user_low, user_high FROM conversations WHERE id = ?1",
                    [conversation_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            Ok(pair.and_then(|(low, high)| {
                if low == user_id {
                    Some(high)
                } else if high == user_id {
                    Some(low)
                } else {
                    None
                }
            }))
        })
    }

    /// Insert a message and refresh the conversation's last-message cache in
    /// one transaction.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        now: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, conversation_id, sender_id, content, now],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message = ?2, last_message_at = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, content, now],
            )?;
            Ok(())
        })
    }

    /// Newest first; pass the oldest `created_at` from the previous page as
    /// `before` to fetch older messages.
    pub fn get_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, content, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                   AND (?3 IS NULL OR created_at < ?3)
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id, limit, before], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Delete all messages in a conversation and clear the last-message
    /// cache. Returns how many messages were removed.
    pub fn delete_history(&self, conversation_id: &str) -> Result<usize> {
        self.with_tx(|tx| {
            let deleted = tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                [conversation_id],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message = NULL, last_message_at = NULL WHERE id = ?1",
                [conversation_id],
            )?;
            Ok(deleted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts;
    use chrono::{Duration, TimeZone, Utc};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ua", "an", "h", "An").unwrap();
        db.create_user("ub", "binh", "h", "Bình").unwrap();
        db
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap()
    }

    #[test]
    fn pair_is_canonical_regardless_of_order() {
        let db = db();
        let c1 = db.create_conversation("ub", "ua", "direct", &ts(t0())).unwrap();
        let c2 = db.create_conversation("ua", "ub", "stranger", &ts(t0())).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(db.list_conversations("ua").unwrap().len(), 1);
    }

    #[test]
    fn partner_lookup_enforces_participation() {
        let db = db();
        db.create_user("uc", "chi", "h", "Chi").unwrap();
        let conv = db.create_conversation("ua", "ub", "direct", &ts(t0())).unwrap();

        assert_eq!(db.conversation_partner(&conv, "ua").unwrap().as_deref(), Some("ub"));
        assert_eq!(db.conversation_partner(&conv, "ub").unwrap().as_deref(), Some("ua"));
        assert!(db.conversation_partner(&conv, "uc").unwrap().is_none());
        assert!(db.conversation_partner("missing", "ua").unwrap().is_none());
    }

    #[test]
    fn sending_updates_last_message_cache() {
        let db = db();
        let conv = db.create_conversation("ua", "ub", "direct", &ts(t0())).unwrap();
        db.insert_message("m1", &conv, "ua", "chào em", &ts(t0() + Duration::seconds(5)))
            .unwrap();

        let listed = db.list_conversations("ub").unwrap();
        assert_eq!(listed[0].last_message.as_deref(), Some("chào em"));
        assert_eq!(listed[0].partner.id, "ua");
    }

    #[test]
    fn pagination_walks_backwards() {
        let db = db();
        let conv = db.create_conversation("ua", "ub", "direct", &ts(t0())).unwrap();
        for i in 0..5 {
            db.insert_message(
                &format!("m{i}"),
                &conv,
                "ua",
                &format!("tin {i}"),
                &ts(t0() + Duration::seconds(i)),
            )
            .unwrap();
        }

        let page1 = db.get_messages(&conv, 2, None).unwrap();
        assert_eq!(page1[0].content, "tin 4");
        assert_eq!(page1[1].content, "tin 3");

        let page2 = db
            .get_messages(&conv, 2, Some(page1[1].created_at.as_str()))
            .unwrap();
        assert_eq!(page2[0].content, "tin 2");
        assert_eq!(page2[1].content, "tin 1");
    }

    #[test]
    fn delete_history_clears_cache() {
        let db = db();
        let conv = db.create_conversation("ua", "ub", "direct", &ts(t0())).unwrap();
        db.insert_message("m1", &conv, "ua", "xóa anh đi", &ts(t0())).unwrap();

        assert_eq!(db.delete_history(&conv).unwrap(), 1);
        assert!(db.get_messages(&conv, 10, None).unwrap().is_empty());
        assert!(db.list_conversations("ua").unwrap()[0].last_message.is_none());
    }
}
