use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use hyliya_api::state::AppState;
use hyliya_db::{Database, ts};

/// Waiting queue entries older than this are treated as disconnected.
const QUEUE_TTL_MINUTES: i64 = 10;

/// Pending invoices older than this have a dead checkout link.
const INVOICE_TTL_HOURS: i64 = 24;

#[derive(Debug, Default, PartialEq)]
pub struct SweepCounts {
    pub premium_lapsed: usize,
    pub invoices_expired: usize,
    pub queue_dropped: usize,
    pub stories_removed: usize,
}

impl SweepCounts {
    fn total(&self) -> usize {
        self.premium_lapsed + self.invoices_expired + self.queue_dropped + self.stories_removed
    }
}

/// Background task that runs all expiry sweeps on an interval.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state.db, Utc::now()) {
            Ok(counts) => {
                if counts.total() > 0 {
                    info!(
                        "Sweep: {} premium lapsed, {} invoices expired, {} queue entries dropped, {} stories removed",
                        counts.premium_lapsed,
                        counts.invoices_expired,
                        counts.queue_dropped,
                        counts.stories_removed
                    );
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

fn sweep_once(db: &Database, now: DateTime<Utc>) -> anyhow::Result<SweepCounts> {
    let queue_cutoff = ts(now - chrono::Duration::minutes(QUEUE_TTL_MINUTES));
    let invoice_cutoff = ts(now - chrono::Duration::hours(INVOICE_TTL_HOURS));

    Ok(SweepCounts {
        premium_lapsed: db.sweep_expired_premium(now)?,
        invoices_expired: db.sweep_stale_invoices(&invoice_cutoff)?,
        queue_dropped: db.sweep_stale_queue(&queue_cutoff)?,
        stories_removed: db.sweep_expired_stories(&ts(now))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("ua", "an", "h", "An").unwrap();
        db
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 8, 10, 0, 0).unwrap()
    }

    #[test]
    fn quiet_database_sweeps_clean() {
        let counts = sweep_once(&db(), now()).unwrap();
        assert_eq!(counts, SweepCounts::default());
    }

    #[test]
    fn one_pass_covers_every_concern() {
        let db = db();

        // Lapsed premium
        db.insert_invoice(1, "ua", "premium_1m", 79_000, "https://pay/1", &ts(now()))
            .unwrap();
        db.mark_paid(1, 30, now()).unwrap();

        // Stale pending invoice
        db.insert_invoice(2, "ua", "premium_1m", 79_000, "https://pay/2", &ts(now()))
            .unwrap();

        // Abandoned queue entry and an expired story
        db.join_queue("ua", &ts(now())).unwrap();
        db.create_story("s1", "ua", "http://m", &ts(now()), &ts(now() + Duration::hours(24)))
            .unwrap();

        let later = now() + Duration::days(40);
        let counts = sweep_once(&db, later).unwrap();
        assert_eq!(
            counts,
            SweepCounts {
                premium_lapsed: 1,
                invoices_expired: 1,
                queue_dropped: 1,
                stories_removed: 1,
            }
        );

        assert!(!db.get_profile("ua").unwrap().unwrap().is_premium);
        assert_eq!(db.get_invoice(2).unwrap().unwrap().status, "expired");

        // Idempotent: the second pass finds nothing.
        assert_eq!(sweep_once(&db, later).unwrap(), SweepCounts::default());
    }

    #[test]
    fn sweep_leaves_live_state_alone() {
        let db = db();
        db.insert_invoice(1, "ua", "premium_1m", 79_000, "https://pay/1", &ts(now()))
            .unwrap();
        db.mark_paid(1, 30, now()).unwrap();
        db.join_queue("ua", &ts(now())).unwrap();

        let soon = now() + Duration::minutes(5);
        assert_eq!(sweep_once(&db, soon).unwrap(), SweepCounts::default());
        assert!(db.get_profile("ua").unwrap().unwrap().is_premium);
    }
}
