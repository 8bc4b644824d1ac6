use anyhow::Result;

use crate::Database;
use crate::models::{FriendRow, PendingRequestRow, ProfileLiteRow};

/// Result of sending a friend request.
pub enum RequestOutcome {
    Sent,
    /// An edge already exists between the pair, in either direction,
    /// pending or accepted.
    Duplicate,
    TargetMissing,
}

impl Database {
    pub fn send_friend_request(&self, from_id: &str, to_id: &str, now: &str) -> Result<RequestOutcome> {
        self.with_tx(|tx| {
            let target_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ?1)",
                [to_id],
                |row| row.get(0),
            )?;
            if !target_exists {
                return Ok(RequestOutcome::TargetMissing);
            }

            let edge_exists: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM friend_requests
                     WHERE (from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1)
                 )",
                [from_id, to_id],
                |row| row.get(0),
            )?;
            if edge_exists {
                return Ok(RequestOutcome::Duplicate);
            }

            tx.execute(
                "INSERT INTO friend_requests (from_id, to_id, status, created_at)
                 VALUES (?1, ?2, 'pending', ?3)",
                rusqlite::params![from_id, to_id, now],
            )?;
            Ok(RequestOutcome::Sent)
        })
    }

    /// Recipient-only. Returns false when there is no pending request from
    /// `from_id` to `to_id`.
    pub fn accept_friend_request(&self, to_id: &str, from_id: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE friend_requests SET status = 'accepted', accepted_at = ?3
                 WHERE from_id = ?1 AND to_id = ?2 AND status = 'pending'",
                rusqlite::params![from_id, to_id, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove a pending edge between the two users, whichever direction it
    /// points. Covers both the recipient declining and the sender cancelling.
    pub fn remove_pending_request(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM friend_requests
                 WHERE status = 'pending'
                   AND ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))",
                [a, b],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn unfriend(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM friend_requests
                 WHERE status = 'accepted'
                   AND ((from_id = ?1 AND to_id = ?2) OR (from_id = ?2 AND to_id = ?1))",
                [a, b],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_friends(&self, user_id: &str) -> Result<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {lite}, fr.accepted_at
                 FROM friend_requests fr
                 JOIN profiles p
                   ON p.id = CASE WHEN fr.from_id = ?1 THEN fr.to_id ELSE fr.from_id END
                 WHERE fr.status = 'accepted' AND ?1 IN (fr.from_id, fr.to_id)
                 ORDER BY fr.accepted_at DESC",
                lite = ProfileLiteRow::columns("p"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        user: ProfileLiteRow::from_row(row, 0)?,
                        since: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Incoming pending requests for the user.
    pub fn list_pending_requests(&self, user_id: &str) -> Result<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {lite}, fr.created_at
                 FROM friend_requests fr
                 JOIN profiles p ON p.id = fr.from_id
                 WHERE fr.to_id = ?1 AND fr.status = 'pending'
                 ORDER BY fr.created_at DESC",
                lite = ProfileLiteRow::columns("p"),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PendingRequestRow {
                        user: ProfileLiteRow::from_row(row, 0)?,
                        requested_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
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

    fn t(secs: i64) -> String {
        ts(Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap() + Duration::seconds(secs))
    }

    #[test]
    fn request_accept_roundtrip() {
        let db = db();
        assert!(matches!(
            db.send_friend_request("ua", "ub", &t(0)).unwrap(),
            RequestOutcome::Sent
        ));

        let pending = db.list_pending_requests("ub").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user.id, "ua");

        assert!(db.accept_friend_request("ub", "ua", &t(1)).unwrap());
        assert!(db.list_pending_requests("ub").unwrap().is_empty());

        let friends_of_a = db.list_friends("ua").unwrap();
        assert_eq!(friends_of_a.len(), 1);
        assert_eq!(friends_of_a[0].user.id, "ub");
        assert_eq!(db.list_friends("ub").unwrap()[0].user.id, "ua");
    }

    #[test]
    fn duplicate_guard_works_both_directions() {
        let db = db();
        db.send_friend_request("ua", "ub", &t(0)).unwrap();
        assert!(matches!(
            db.send_friend_request("ub", "ua", &t(1)).unwrap(),
            RequestOutcome::Duplicate
        ));
        assert!(matches!(
            db.send_friend_request("ua", "ghost", &t(2)).unwrap(),
            RequestOutcome::TargetMissing
        ));
    }

    #[test]
    fn accept_requires_pending_toward_caller() {
        let db = db();
        db.send_friend_request("ua", "ub", &t(0)).unwrap();
        // The sender can't accept their own request
        assert!(!db.accept_friend_request("ua", "ub", &t(1)).unwrap());
        assert!(db.accept_friend_request("ub", "ua", &t(1)).unwrap());
    }

    #[test]
    fn decline_and_unfriend() {
        let db = db();
        db.send_friend_request("ua", "ub", &t(0)).unwrap();
        assert!(db.remove_pending_request("ub", "ua").unwrap());
        assert!(db.list_pending_requests("ub").unwrap().is_empty());

        db.send_friend_request("ua", "ub", &t(1)).unwrap();
        db.accept_friend_request("ub", "ua", &t(2)).unwrap();
        assert!(db.unfriend("ua", "ub").unwrap());
        assert!(db.list_friends("ua").unwrap().is_empty());
        assert!(!db.unfriend("ua", "ub").unwrap());
    }
}
