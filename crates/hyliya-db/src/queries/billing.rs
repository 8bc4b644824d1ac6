use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use super::OptionalExt;
use crate::models::InvoiceRow;
use crate::{Database, parse_ts, ts};

/// Result of applying a payment confirmation.
pub enum PaidOutcome {
    /// Entitlement granted; carries the new premium expiry.
    Applied { premium_expires: String },
    /// The invoice was already paid — the duplicate delivery is a no-op.
    AlreadyPaid,
    /// Invoice exists but is cancelled/expired; no entitlement change.
    NotPending { status: String },
    NotFound,
}

impl Database {
    pub fn insert_invoice(
        &self,
        order_code: i64,
        user_id: &str,
        package_id: &str,
        amount: i64,
        checkout_url: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO invoices (order_code, user_id, package_id, amount, status, checkout_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
                rusqlite::params![order_code, user_id, package_id, amount, checkout_url, now],
            )?;
            Ok(())
        })
    }

    pub fn get_invoice(&self, order_code: i64) -> Result<Option<InvoiceRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT order_code, user_id, package_id, amount, status, checkout_url, created_at, paid_at
                     FROM invoices WHERE order_code = ?1",
                    [order_code],
                    |row| {
                        Ok(InvoiceRow {
                            order_code: row.get(0)?,
                            user_id: row.get(1)?,
                            package_id: row.get(2)?,
                            amount: row.get(3)?,
                            status: row.get(4)?,
                            checkout_url: row.get(5)?,
                            created_at: row.get(6)?,
                            paid_at: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Mark an invoice paid and grant the premium entitlement, in one
    /// transaction guarded by the invoice's current status. The webhook and
    /// the client-side status poll both funnel into this, so a second
    /// delivery of the same confirmation leaves the expiry untouched.
    ///
    /// A payment landing while the user is still premium extends from the
    /// current expiry rather than from `now`.
    pub fn mark_paid(&self, order_code: i64, package_days: i64, now: DateTime<Utc>) -> Result<PaidOutcome> {
        self.with_tx(|tx| {
            let invoice: Option<(String, String)> = tx
                .query_row(
                    "SELECT user_id, status FROM invoices WHERE order_code = ?1",
                    [order_code],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((user_id, status)) = invoice else {
                return Ok(PaidOutcome::NotFound);
            };

            match status.as_str() {
                "pending" => {}
                "paid" => return Ok(PaidOutcome::AlreadyPaid),
                _ => return Ok(PaidOutcome::NotPending { status }),
            }

            let current: Option<String> = tx.query_row(
                "SELECT premium_expires FROM profiles WHERE id = ?1",
                [user_id.as_str()],
                |row| row.get(0),
            )?;

            let base = current
                .map(|s| parse_ts(&s))
                .filter(|expires| *expires > now)
                .unwrap_or(now);
            let premium_expires = ts(base + Duration::days(package_days));

            tx.execute(
                "UPDATE profiles SET is_premium = 1, premium_expires = ?2 WHERE id = ?1",
                rusqlite::params![user_id, premium_expires],
            )?;
            tx.execute(
                "UPDATE invoices SET status = 'paid', paid_at = ?2 WHERE order_code = ?1",
                rusqlite::params![order_code, ts(now)],
            )?;

            Ok(PaidOutcome::Applied { premium_expires })
        })
    }

    /// Cancel a pending invoice (user backed out of checkout). Returns false
    /// if the invoice wasn't pending.
    pub fn mark_cancelled(&self, order_code: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE invoices SET status = 'cancelled' WHERE order_code = ?1 AND status = 'pending'",
                [order_code],
            )?;
            Ok(changed > 0)
        })
    }

    /// Flip profiles whose premium has lapsed back to non-premium. The
    /// expiry timestamp is kept for history, so a second sweep run finds
    /// nothing to do.
    pub fn sweep_expired_premium(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let flipped = conn.execute(
                "UPDATE profiles SET is_premium = 0
                 WHERE is_premium = 1 AND premium_expires IS NOT NULL AND premium_expires < ?1",
                [ts(now)],
            )?;
            Ok(flipped)
        })
    }

    /// Expire pending invoices whose checkout link has gone stale.
    pub fn sweep_stale_invoices(&self, cutoff: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let expired = conn.execute(
                "UPDATE invoices SET status = 'expired'
                 WHERE status = 'pending' AND created_at < ?1",
                [cutoff],
            )?;
            Ok(expired)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ua", "an", "h", "An").unwrap();
        db
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap()
    }

    #[test]
    fn paid_invoice_grants_premium() {
        let db = db();
        db.insert_invoice(12345, "ua", "premium_1m", 79_000, "https://pay/x", &ts(now()))
            .unwrap();

        let PaidOutcome::Applied { premium_expires } =
            db.mark_paid(12345, 30, now()).unwrap()
        else {
            panic!("pending invoice should apply");
        };
        assert_eq!(premium_expires, ts(now() + Duration::days(30)));

        let profile = db.get_profile("ua").unwrap().unwrap();
        assert!(profile.is_premium);
        assert_eq!(profile.premium_expires.as_deref(), Some(premium_expires.as_str()));

        let invoice = db.get_invoice(12345).unwrap().unwrap();
        assert_eq!(invoice.status, "paid");
        assert!(invoice.paid_at.is_some());
    }

    #[test]
    fn second_confirmation_leaves_expiry_unchanged() {
        // The provider redelivers webhooks; the second one must be a no-op.
        let db = db();
        db.insert_invoice(12345, "ua", "premium_1m", 79_000, "https://pay/x", &ts(now()))
            .unwrap();

        db.mark_paid(12345, 30, now()).unwrap();
        let expires_before = db.get_profile("ua").unwrap().unwrap().premium_expires;

        assert!(matches!(
            db.mark_paid(12345, 30, now() + Duration::minutes(1)).unwrap(),
            PaidOutcome::AlreadyPaid
        ));
        let expires_after = db.get_profile("ua").unwrap().unwrap().premium_expires;
        assert_eq!(expires_before, expires_after);
    }

    #[test]
    fn paying_while_premium_extends_from_current_expiry() {
        let db = db();
        db.insert_invoice(1, "ua", "premium_1m", 79_000, "https://pay/1", &ts(now()))
            .unwrap();
        db.insert_invoice(2, "ua", "premium_1m", 79_000, "https://pay/2", &ts(now()))
            .unwrap();

        db.mark_paid(1, 30, now()).unwrap();
        let PaidOutcome::Applied { premium_expires } =
            db.mark_paid(2, 30, now() + Duration::days(1)).unwrap()
        else {
            panic!("second order should apply");
        };
        assert_eq!(premium_expires, ts(now() + Duration::days(60)));
    }

    #[test]
    fn cancelled_invoice_cannot_be_paid() {
        let db = db();
        db.insert_invoice(7, "ua", "premium_1m", 79_000, "https://pay/7", &ts(now()))
            .unwrap();
        assert!(db.mark_cancelled(7).unwrap());
        assert!(!db.mark_cancelled(7).unwrap());

        assert!(matches!(
            db.mark_paid(7, 30, now()).unwrap(),
            PaidOutcome::NotPending { .. }
        ));
        assert!(!db.get_profile("ua").unwrap().unwrap().is_premium);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let db = db();
        assert!(matches!(db.mark_paid(999, 30, now()).unwrap(), PaidOutcome::NotFound));
    }

    #[test]
    fn expiry_sweep_flips_exactly_once() {
        let db = db();
        db.insert_invoice(1, "ua", "premium_1m", 79_000, "https://pay/1", &ts(now()))
            .unwrap();
        db.mark_paid(1, 30, now()).unwrap();

        // Not yet lapsed
        assert_eq!(db.sweep_expired_premium(now() + Duration::days(29)).unwrap(), 0);

        let after_lapse = now() + Duration::days(31);
        assert_eq!(db.sweep_expired_premium(after_lapse).unwrap(), 1);
        assert!(!db.get_profile("ua").unwrap().unwrap().is_premium);

        // Second run finds nothing; no re-grant without a new payment.
        assert_eq!(db.sweep_expired_premium(after_lapse).unwrap(), 0);
        assert!(!db.get_profile("ua").unwrap().unwrap().is_premium);
    }

    #[test]
    fn stale_pending_invoices_expire() {
        let db = db();
        db.insert_invoice(1, "ua", "premium_1m", 79_000, "https://pay/1", &ts(now()))
            .unwrap();
        db.insert_invoice(2, "ua", "premium_1m", 79_000, "https://pay/2", &ts(now() + Duration::hours(2)))
            .unwrap();

        assert_eq!(db.sweep_stale_invoices(&ts(now() + Duration::hours(1))).unwrap(), 1);
        assert_eq!(db.get_invoice(1).unwrap().unwrap().status, "expired");
        assert_eq!(db.get_invoice(2).unwrap().unwrap().status, "pending");
    }
}
