//! Consistency analytics for purchase ledgers.
//!
//! Analytics layer of the tally workspace, consuming `tally-core`:
//!
//! - [`bucket`]: calendar-day bucketing of purchase events in an arbitrary
//!   time zone.
//! - [`consistency`]: the three-signal consistency score (stability,
//!   recency, trend) and its parameter model.
//! - [`snapshot`]: the weekly sweep that scores every owner and records
//!   the results in the monthly archive.
//!
//! Bucketing and scoring are pure and safe to call from any thread; the
//! snapshot sweep performs synchronous file I/O and belongs on a background
//! task.

pub mod bucket;
pub mod consistency;
pub mod snapshot;

pub use bucket::{BucketError, day_buckets, day_buckets_for_records};
pub use consistency::{Consistency, Params, ScoreError, Weights, score_daily_counts, score_records};
pub use snapshot::{OwnerShops, SnapshotReport, WeeklySnapshot, week_of_month};
