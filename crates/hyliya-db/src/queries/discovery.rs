use anyhow::Result;

use super::chat::find_or_create_conversation;
use crate::Database;
use crate::models::ProfileLiteRow;

/// Result of recording a swipe.
pub enum SwipeOutcome {
    /// Target profile doesn't exist.
    TargetMissing,
    /// The user already swiped this target; nothing changed.
    Duplicate,
    /// Swipe stored. `matched` carries the conversation id when this like
    /// completed a mutual pair.
    Recorded { matched: Option<String> },
}

impl Database {
    /// Candidate profiles for the swipe deck: everyone except the user
    /// themself, targets they already swiped, and accepted friends. Seeded
    /// personas are included like any other profile.
    pub fn discover(&self, user_id: &str, limit: u32) -> Result<Vec<ProfileLiteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {lite}
                 FROM profiles p
                 WHERE p.id != ?1
                   AND p.id NOT IN (SELECT target_id FROM swipes WHERE swiper_id = ?1)
                   AND p.id NOT IN (
                       SELECT CASE WHEN from_id = ?1 THEN to_id ELSE from_id END
                       FROM friend_requests
                       WHERE status = 'accepted' AND ?1 IN (from_id, to_id)
                   )
                 ORDER BY p.created_at DESC, p.id
                 LIMIT ?2",
                lite = ProfileLiteRow::columns("p"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    ProfileLiteRow::from_row(row, 0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Record a swipe. A mutual like creates (or finds) the pair
    /// conversation in the same transaction, so two users liking each other
    /// simultaneously still end up with exactly one conversation.
    pub fn record_swipe(
        &self,
        swiper_id: &str,
        target_id: &str,
        liked: bool,
        now: &str,
    ) -> Result<SwipeOutcome> {
        self.with_tx(|tx| {
            let target_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ?1)",
                [target_id],
                |row| row.get(0),
            )?;
            if !target_exists {
                return Ok(SwipeOutcome::TargetMissing);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO swipes (swiper_id, target_id, liked, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![swiper_id, target_id, liked, now],
            )?;
            if inserted == 0 {
                return Ok(SwipeOutcome::Duplicate);
            }

            if !liked {
                return Ok(SwipeOutcome::Recorded { matched: None });
            }

            let reciprocal: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM swipes
                     WHERE swiper_id = ?1 AND target_id = ?2 AND liked = 1
                 )",
                [target_id, swiper_id],
                |row| row.get(0),
            )?;

            let matched = if reciprocal {
                Some(find_or_create_conversation(tx, swiper_id, target_id, "match", now)?)
            } else {
                None
            };

            Ok(SwipeOutcome::Recorded { matched })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts;
    use chrono::{TimeZone, Utc};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ua", "an", "h", "An").unwrap();
        db.create_user("ub", "binh", "h", "Bình").unwrap();
        db
    }

    fn now() -> String {
        ts(Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap())
    }

    #[test]
    fn deck_excludes_self_and_swiped() {
        let db = db();
        let before = db.discover("ua", 50).unwrap();
        assert!(before.iter().all(|p| p.id != "ua"));
        assert!(before.iter().any(|p| p.id == "ub"));
        // Seeded personas fill the deck
        assert!(before.len() > 1);

        db.record_swipe("ua", "ub", false, &now()).unwrap();
        let after = db.discover("ua", 50).unwrap();
        assert!(after.iter().all(|p| p.id != "ub"));
    }

    #[test]
    fn mutual_like_creates_single_conversation() {
        let db = db();
        let first = db.record_swipe("ua", "ub", true, &now()).unwrap();
        let SwipeOutcome::Recorded { matched: None } = first else {
            panic!("first like should not match yet");
        };

        let second = db.record_swipe("ub", "ua", true, &now()).unwrap();
        let SwipeOutcome::Recorded { matched: Some(conv) } = second else {
            panic!("reciprocal like should match");
        };

        assert_eq!(db.list_conversations("ua").unwrap().len(), 1);
        assert_eq!(db.list_conversations("ua").unwrap()[0].id, conv);
        assert_eq!(db.list_conversations("ua").unwrap()[0].origin, "match");
    }

    #[test]
    fn repeat_swipe_is_noop() {
        let db = db();
        db.record_swipe("ua", "ub", false, &now()).unwrap();
        // Changing the answer later doesn't rewrite the stored swipe
        let again = db.record_swipe("ua", "ub", true, &now()).unwrap();
        assert!(matches!(again, SwipeOutcome::Duplicate));
    }

    #[test]
    fn swiping_nobody_is_an_error_state() {
        let db = db();
        let out = db.record_swipe("ua", "ghost", true, &now()).unwrap();
        assert!(matches!(out, SwipeOutcome::TargetMissing));
    }
}
