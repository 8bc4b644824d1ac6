use anyhow::Result;

use super::OptionalExt;
use super::chat::find_or_create_conversation;
use crate::Database;
use crate::models::QueueRow;

/// Result of one poll of the stranger queue.
pub enum PollOutcome {
    /// Caller has no queue entry (never joined, or already consumed a match).
    NotQueued,
    /// Still waiting for a partner.
    Waiting,
    /// Paired. Returned to both sides: the claimer directly, the partner on
    /// their next poll via the matched hand-off row.
    Matched {
        conversation_id: String,
        partner_id: String,
    },
}

impl Database {
    /// Insert a waiting marker if not already present. Idempotent: re-joining
    /// while waiting (or while an unconsumed match is parked on the entry)
    /// returns the existing row unchanged.
    pub fn join_queue(&self, user_id: &str, now: &str) -> Result<QueueRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO stranger_queue (user_id, status, joined_at)
                 VALUES (?1, 'waiting', ?2)",
                rusqlite::params![user_id, now],
            )?;

            let row = tx.query_row(
                "SELECT user_id, status, conversation_id, joined_at
                 FROM stranger_queue WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(QueueRow {
                        user_id: row.get(0)?,
                        status: row.get(1)?,
                        conversation_id: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    /// One atomic matchmaking step.
    ///
    /// Everything happens inside a single IMMEDIATE transaction, which is
    /// what closes the both-sides-claim-each-other race: whichever side's
    /// poll commits first creates the conversation and hands it to the
    /// partner by flipping the partner's entry to `matched`; the loser's
    /// poll then finds its own entry already matched and just consumes it.
    pub fn poll_queue(&self, user_id: &str, now: &str) -> Result<PollOutcome> {
        self.with_tx(|tx| {
            let own: Option<(String, Option<String>)> = tx
                .query_row(
                    "SELECT status, conversation_id FROM stranger_queue WHERE user_id = ?1",
                    [user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((status, conversation_id)) = own else {
                return Ok(PollOutcome::NotQueued);
            };

            // Partner already claimed us: consume the hand-off.
            if status == "matched" {
                let Some(conversation_id) = conversation_id else {
                    anyhow::bail!("matched queue entry without conversation for {}", user_id);
                };
                let partner_id: String = tx.query_row(
                    "SELECT CASE WHEN user_low = ?2 THEN user_high ELSE user_low END
                     FROM conversations WHERE id = ?1",
                    [conversation_id.as_str(), user_id],
                    |row| row.get(0),
                )?;
                tx.execute("DELETE FROM stranger_queue WHERE user_id = ?1", [user_id])?;
                return Ok(PollOutcome::Matched {
                    conversation_id,
                    partner_id,
                });
            }

            // Earliest other waiting user wins.
            let partner: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM stranger_queue
                     WHERE user_id != ?1 AND status = 'waiting'
                     ORDER BY joined_at, user_id
                     LIMIT 1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(partner_id) = partner else {
                return Ok(PollOutcome::Waiting);
            };

            let conversation_id =
                find_or_create_conversation(tx, user_id, &partner_id, "stranger", now)?;

            tx.execute(
                "UPDATE stranger_queue SET status = 'matched', conversation_id = ?2
                 WHERE user_id = ?1",
                rusqlite::params![partner_id, conversation_id],
            )?;
            tx.execute("DELETE FROM stranger_queue WHERE user_id = ?1", [user_id])?;

            Ok(PollOutcome::Matched {
                conversation_id,
                partner_id,
            })
        })
    }

    /// Remove the caller's marker (cancel, disconnect). Idempotent.
    pub fn leave_queue(&self, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM stranger_queue WHERE user_id = ?1", [user_id])?;
            Ok(removed > 0)
        })
    }

    /// Drop entries older than `cutoff` — the disconnect case, where a
    /// client joined and never polled again. Matched hand-offs that were
    /// never consumed age out the same way.
    pub fn sweep_stale_queue(&self, cutoff: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM stranger_queue WHERE joined_at < ?1",
                [cutoff],
            )?;
            Ok(removed)
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
        for (id, name) in [("ua", "an"), ("ub", "binh"), ("uc", "chi")] {
            db.create_user(id, name, "h", name).unwrap();
        }
        db
    }

    fn t(secs: i64) -> String {
        ts(Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap() + Duration::seconds(secs))
    }

    #[test]
    fn join_is_idempotent() {
        let db = db();
        let first = db.join_queue("ua", &t(0)).unwrap();
        let second = db.join_queue("ua", &t(5)).unwrap();
        assert_eq!(second.joined_at, first.joined_at);
        assert_eq!(second.status, "waiting");
    }

    #[test]
    fn lone_user_keeps_waiting() {
        let db = db();
        db.join_queue("ua", &t(0)).unwrap();
        assert!(matches!(db.poll_queue("ua", &t(2)).unwrap(), PollOutcome::Waiting));
    }

    #[test]
    fn poll_without_joining_reports_not_queued() {
        let db = db();
        assert!(matches!(db.poll_queue("ua", &t(0)).unwrap(), PollOutcome::NotQueued));
    }

    #[test]
    fn two_waiters_converge_on_one_conversation() {
        // A joins at t=0, B at t=1, both poll. Exactly one conversation
        // must exist and both sides must see the same id.
        let db = db();
        db.join_queue("ua", &t(0)).unwrap();
        db.join_queue("ub", &t(1)).unwrap();

        let PollOutcome::Matched { conversation_id: conv_a, partner_id } =
            db.poll_queue("ua", &t(2)).unwrap()
        else {
            panic!("A should match");
        };
        assert_eq!(partner_id, "ub");

        let PollOutcome::Matched { conversation_id: conv_b, partner_id } =
            db.poll_queue("ub", &t(2)).unwrap()
        else {
            panic!("B should consume the hand-off");
        };
        assert_eq!(partner_id, "ua");
        assert_eq!(conv_a, conv_b);

        // Queue fully drained; a repeat poll is NotQueued, not a new match.
        assert!(matches!(db.poll_queue("ua", &t(3)).unwrap(), PollOutcome::NotQueued));
        assert!(matches!(db.poll_queue("ub", &t(3)).unwrap(), PollOutcome::NotQueued));
        assert_eq!(db.list_conversations("ua").unwrap().len(), 1);
    }

    #[test]
    fn earliest_waiter_is_claimed_first() {
        let db = db();
        db.join_queue("ub", &t(0)).unwrap();
        db.join_queue("uc", &t(1)).unwrap();
        db.join_queue("ua", &t(2)).unwrap();

        let PollOutcome::Matched { partner_id, .. } = db.poll_queue("ua", &t(3)).unwrap() else {
            panic!("A should match");
        };
        assert_eq!(partner_id, "ub");
    }

    #[test]
    fn rematching_a_known_pair_reuses_the_conversation() {
        let db = db();
        let existing = db.create_conversation("ua", "ub", "stranger", &t(0)).unwrap();

        db.join_queue("ua", &t(1)).unwrap();
        db.join_queue("ub", &t(2)).unwrap();
        let PollOutcome::Matched { conversation_id, .. } = db.poll_queue("ua", &t(3)).unwrap()
        else {
            panic!("should match");
        };
        assert_eq!(conversation_id, existing);
    }

    #[test]
    fn leave_and_sweep_clear_markers() {
        let db = db();
        db.join_queue("ua", &t(0)).unwrap();
        assert!(db.leave_queue("ua").unwrap());
        assert!(!db.leave_queue("ua").unwrap());

        db.join_queue("ub", &t(0)).unwrap();
        db.join_queue("uc", &t(100)).unwrap();
        assert_eq!(db.sweep_stale_queue(&t(50)).unwrap(), 1);
        assert!(matches!(db.poll_queue("ub", &t(101)).unwrap(), PollOutcome::NotQueued));
        assert!(matches!(db.poll_queue("uc", &t(101)).unwrap(), PollOutcome::Waiting));
    }
}
