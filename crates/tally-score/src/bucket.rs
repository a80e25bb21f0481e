//! Calendar-day bucketing of purchase events.
//!
//! Turns a pile of `(timestamp, quantity)` pairs into a fixed-length array of
//! per-day totals relative to "now": index 0 is the current calendar day in
//! the given time zone, index `d` is exactly `d` calendar days earlier.
//!
//! Day distance is measured between *local calendar dates*, midnight to
//! midnight in the given zone (not by dividing a raw millisecond delta), so
//! daylight-saving transitions cannot shift an event into the wrong bucket.
//! Events dated in the future or older than the window are dropped.

use chrono::{DateTime, TimeZone, Utc};

use tally_core::record::PurchaseRecord;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BucketError {
    /// The window must cover at least one day.
    #[error("window must cover at least one day")]
    EmptyWindow,
}

// ---------------------------------------------------------------------------
// Bucketing
// ---------------------------------------------------------------------------

/// Sum quantities into per-day buckets.
///
/// Each `(timestamp_ms, quantity)` pair lands in the bucket for its local
/// calendar day, or is dropped when outside `[0, window_days)` days ago.
/// Quantities are summed as-is; a hostile negative quantity stays visible to
/// the caller instead of being clamped here. Timestamps outside the
/// representable range are dropped like any other out-of-window event.
///
/// # Errors
///
/// Returns [`BucketError::EmptyWindow`] when `window_days` is zero.
pub fn day_buckets<Tz: TimeZone>(
    sales: impl IntoIterator<Item = (i64, i64)>,
    window_days: usize,
    now: DateTime<Utc>,
    zone: &Tz,
) -> Result<Vec<i64>, BucketError> {
    if window_days == 0 {
        return Err(BucketError::EmptyWindow);
    }

    let today = now.with_timezone(zone).date_naive();
    let mut buckets = vec![0i64; window_days];

    for (timestamp_ms, quantity) in sales {
        let Some(instant) = DateTime::from_timestamp_millis(timestamp_ms) else {
            continue;
        };
        let day = instant.with_timezone(zone).date_naive();
        let days_ago = today.signed_duration_since(day).num_days();

        if let Ok(idx) = usize::try_from(days_ago) {
            if idx < window_days {
                buckets[idx] += quantity;
            }
        }
    }

    Ok(buckets)
}

/// [`day_buckets`] over purchase records, summing each record's quantity
/// into its day.
///
/// # Errors
///
/// Same as [`day_buckets`].
pub fn day_buckets_for_records<Tz: TimeZone>(
    records: &[PurchaseRecord],
    window_days: usize,
    now: DateTime<Utc>,
    zone: &Tz,
) -> Result<Vec<i64>, BucketError> {
    day_buckets(
        records.iter().map(|r| (r.timestamp_ms, r.quantity)),
        window_days,
        now,
        zone,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn rejects_zero_day_window() {
        let err = day_buckets([], 0, noon(), &Utc).expect_err("should reject");
        assert_eq!(err, BucketError::EmptyWindow);
    }

    #[test]
    fn empty_input_yields_zeroed_window() {
        let buckets = day_buckets([], 7, noon(), &Utc).expect("bucketize");
        assert_eq!(buckets, vec![0; 7]);
    }

    // -----------------------------------------------------------------------
    // Window boundaries
    // -----------------------------------------------------------------------

    #[test]
    fn event_at_now_lands_in_bucket_zero() {
        let now = noon();
        let buckets = day_buckets([(now.timestamp_millis(), 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets, vec![1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn event_on_last_window_day_is_kept() {
        let now = noon();
        let ts = now.timestamp_millis() - 6 * DAY_MS;
        let buckets = day_buckets([(ts, 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets[6], 1);
    }

    #[test]
    fn event_exactly_window_days_old_is_dropped() {
        let now = noon();
        let ts = now.timestamp_millis() - 7 * DAY_MS;
        let buckets = day_buckets([(ts, 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets, vec![0; 7]);
    }

    #[test]
    fn future_events_are_dropped() {
        let now = noon();
        let ts = now.timestamp_millis() + DAY_MS;
        let buckets = day_buckets([(ts, 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets, vec![0; 7]);
    }

    // -----------------------------------------------------------------------
    // Calendar days, not 24-hour spans
    // -----------------------------------------------------------------------

    #[test]
    fn same_calendar_day_is_bucket_zero_even_23_hours_apart() {
        let now = Utc
            .with_ymd_and_hms(2025, 9, 15, 23, 30, 0)
            .single()
            .expect("valid instant");
        let early = Utc
            .with_ymd_and_hms(2025, 9, 15, 0, 30, 0)
            .single()
            .expect("valid instant");
        let buckets =
            day_buckets([(early.timestamp_millis(), 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets, vec![1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn zone_offset_decides_the_calendar_day() {
        // 23:00 UTC on the 14th is already the 15th at UTC+02:00.
        let zone = FixedOffset::east_opt(2 * 3600).expect("valid offset");
        let now = noon();
        let late_utc = Utc
            .with_ymd_and_hms(2025, 9, 14, 23, 0, 0)
            .single()
            .expect("valid instant");

        let in_zone =
            day_buckets([(late_utc.timestamp_millis(), 1)], 7, now, &zone).expect("bucketize");
        assert_eq!(in_zone, vec![1, 0, 0, 0, 0, 0, 0]);

        let in_utc =
            day_buckets([(late_utc.timestamp_millis(), 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(in_utc, vec![0, 1, 0, 0, 0, 0, 0]);
    }

    // -----------------------------------------------------------------------
    // Quantity summing
    // -----------------------------------------------------------------------

    #[test]
    fn quantities_accumulate_per_day() {
        let now = noon();
        let today = now.timestamp_millis();
        let yesterday = today - DAY_MS;
        let buckets = day_buckets([(today, 2), (today, 3), (yesterday, 1)], 7, now, &Utc)
            .expect("bucketize");
        assert_eq!(buckets, vec![5, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn negative_quantities_flow_through() {
        let now = noon();
        let buckets =
            day_buckets([(now.timestamp_millis(), -4)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets[0], -4);
    }

    #[test]
    fn unrepresentable_timestamps_are_dropped() {
        let now = noon();
        let buckets = day_buckets([(i64::MAX, 1), (i64::MIN, 1)], 7, now, &Utc).expect("bucketize");
        assert_eq!(buckets, vec![0; 7]);
    }
}
