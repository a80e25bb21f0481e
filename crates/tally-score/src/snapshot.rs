//! Weekly consistency snapshots across every shop an owner runs.
//!
//! The sweep is meant to run from a periodic background task: for each owner
//! it replays all of their ledgers, scores the recent window, and upserts the
//! final score into the current month's archive under the current
//! week-of-month (a 5th calendar week is clamped into the `Week4` column).
//!
//! The owner-to-shops index comes from the caller; shop registration lives
//! with the host, not here. Per-owner read or write failures are warned and
//! counted, never fatal: one unreadable ledger must not sink the whole sweep.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use tracing::{info, warn};

use tally_core::archive::{ConsistencyArchive, MonthKey};
use tally_core::ledger::{PurchaseLedger, ShopKey};

use crate::consistency::{self, Params};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// One owner and the shops they run.
#[derive(Debug, Clone)]
pub struct OwnerShops {
    /// Display name, used as the archive row key.
    pub owner: String,
    /// Every shop whose sales count toward this owner's score.
    pub shops: Vec<ShopKey>,
}

/// What a sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotReport {
    /// The month table that was updated.
    pub month: MonthKey,
    /// Which week column received the scores.
    pub week_index: u8,
    /// Owners whose score landed in the archive.
    pub scored: usize,
    /// Owners skipped because scoring or recording failed.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// WeeklySnapshot
// ---------------------------------------------------------------------------

/// Periodic job gluing ledger replay, scoring, and the archive together.
#[derive(Debug, Clone)]
pub struct WeeklySnapshot {
    ledger: PurchaseLedger,
    archive: ConsistencyArchive,
    params: Params,
}

impl WeeklySnapshot {
    /// Build a sweep over the given ledger root and archive.
    #[must_use]
    pub const fn new(ledger: PurchaseLedger, archive: ConsistencyArchive, params: Params) -> Self {
        Self {
            ledger,
            archive,
            params,
        }
    }

    /// Run one sweep at the given reference instant.
    ///
    /// Ledgers that fail to read are warned and contribute no sales; owners
    /// whose score cannot be computed or recorded are warned and counted in
    /// [`SnapshotReport::failed`].
    pub fn run<Tz: TimeZone>(
        &self,
        owners: &[OwnerShops],
        now: DateTime<Utc>,
        zone: &Tz,
    ) -> SnapshotReport {
        let today = now.with_timezone(zone).date_naive();
        let month = MonthKey::from_date(today);
        let week_index = u8::try_from(week_of_month(today).min(4)).unwrap_or(4);

        let mut scored = 0usize;
        let mut failed = 0usize;

        for entry in owners {
            let mut records = Vec::new();
            for &shop in &entry.shops {
                match self.ledger.list_all(shop) {
                    Ok(mut batch) => records.append(&mut batch),
                    Err(err) => {
                        warn!(owner = %entry.owner, %shop, %err,
                            "failed to read a ledger during the snapshot sweep");
                    }
                }
            }

            let result = match consistency::score_records(&records, &self.params, now, zone) {
                Ok(result) => result,
                Err(err) => {
                    warn!(owner = %entry.owner, %err, "failed to score owner");
                    failed += 1;
                    continue;
                }
            };

            match self
                .archive
                .record_weekly_score(&entry.owner, month, week_index, result.final_score)
            {
                Ok(()) => scored += 1,
                Err(err) => {
                    warn!(owner = %entry.owner, %err, "failed to record weekly score");
                    failed += 1;
                }
            }
        }

        info!(month = %month, week = week_index, scored, failed,
            "weekly consistency snapshot complete");

        SnapshotReport {
            month,
            week_index,
            scored,
            failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Week math
// ---------------------------------------------------------------------------

/// Week-of-month, 1-based: the ISO week-of-year distance between the date
/// and the 1st of its month, plus one. Values of 5 are possible; callers
/// that only keep four columns clamp.
#[must_use]
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    let first_week = i64::from(first.iso_week().week());
    let current_week = i64::from(date.iso_week().week());

    let mut diff = current_week - first_week;
    if diff < 0 {
        diff += 53; // ISO week-of-year wraps across New Year
    }
    u32::try_from(diff + 1).unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
