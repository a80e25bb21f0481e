//! Consistency scoring over per-day sale counts.
//!
//! Produces a score in `[0, 1]` for a shop's recent window by blending three
//! signals, each answering one question:
//!
//! 1. **Stability**: are the daily numbers smooth?
//! 2. **Recency**: did most sales happen recently?
//! 3. **Trend**: is the overall line flat or only gently sloped?
//!
//! Stability and trend operate on a *dampened* series
//! `y[d] = ln(1 + max(0, counts[d]))`, so one cheap-item spam day cannot
//! dominate the math. Trend uses a *relative* slope (slope divided by the
//! series mean), so small and large shops are judged on the same footing.
//! Recency works on the raw counts with an exponential decay whose rate is
//! derived from the window length and a target tail weight.
//!
//! Everything here is a deterministic pure function of the input array and
//! parameters; no hidden state, no clocks.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use tally_core::config::ScoringConfig;
use tally_core::record::PurchaseRecord;

use crate::bucket::{self, BucketError};

/// Guards divisions by zero on all-zero windows.
const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    /// Fewer than two daily buckets; no variance or slope to speak of.
    #[error("need at least two daily buckets, got {0}")]
    TooFewDays(usize),

    /// Invalid bucketing parameters.
    #[error(transparent)]
    Bucket(#[from] BucketError),
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Blend weights for the three component signals.
///
/// Any non-negative weights work; the blend divides by their sum, so they
/// need not add up to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub stability: f64,
    pub recency: f64,
    pub trend: f64,
}

impl Weights {
    /// Sum of the three weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.stability + self.recency + self.trend
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            stability: 0.30,
            recency: 0.40,
            trend: 0.30,
        }
    }
}

/// Tunable scoring parameters.
///
/// `lambda` is the recency decay rate: day `d` is weighted `e^(-lambda·d)`.
/// [`Params::default`] derives it so the oldest in-window day retains 10% of
/// today's weight, so short windows decay steeply and long windows gently,
/// keeping the same end-of-window emphasis. `max_slope` is the relative
/// slope magnitude treated as "very steep" by the trend signal (0.25 ≈ 25%
/// of baseline per day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub window_days: usize,
    pub lambda: f64,
    pub max_slope: f64,
    pub weights: Weights,
}

impl Params {
    /// Parameters for a window, with `lambda` derived from the tail weight.
    #[must_use]
    pub fn for_window(
        window_days: usize,
        tail_weight: f64,
        max_slope: f64,
        weights: Weights,
    ) -> Self {
        Self {
            window_days,
            lambda: lambda_for_tail_weight(window_days, tail_weight),
            max_slope,
            weights,
        }
    }

    /// Parameters from a `[scoring]` config section.
    #[must_use]
    pub fn from_config(cfg: &ScoringConfig) -> Self {
        Self::for_window(
            cfg.window_days,
            cfg.tail_weight,
            cfg.max_slope,
            Weights {
                stability: cfg.weights.stability,
                recency: cfg.weights.recency,
                trend: cfg.weights.trend,
            },
        )
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::for_window(7, 0.10, 0.25, Weights::default())
    }
}

/// Decay rate giving the oldest in-window day exactly `tail_weight` of
/// today's weight: `lambda = -ln(tail_weight) / max(1, window_days - 1)`.
///
/// Degenerate tail weights saturate: 0 means "only today counts", 1 means
/// "no decay".
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn lambda_for_tail_weight(window_days: usize, tail_weight: f64) -> f64 {
    let span = window_days.saturating_sub(1).max(1);
    let t = tail_weight.clamp(0.0, 1.0);
    if t <= 0.0 {
        return 1e9;
    }
    if t >= 1.0 {
        return 0.0;
    }
    -t.ln() / span as f64
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Scoring output, ready for display.
///
/// The sub-scores and the blend are all in `[0, 1]`. The raw descriptive
/// statistics (`mean_per_day`, `std_dev_per_day`, `slope_per_day`) are
/// computed on the undampened counts so owners see familiar numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Consistency {
    /// Weighted blend of the three sub-scores.
    pub final_score: f64,
    /// Higher when day-to-day counts are even.
    pub stability: f64,
    /// Higher when most sales happened recently.
    pub recency: f64,
    /// Higher when the overall line is flat or gently sloped.
    pub trend: f64,
    /// Arithmetic mean of the raw counts.
    pub mean_per_day: f64,
    /// Population standard deviation of the raw counts.
    pub std_dev_per_day: f64,
    /// Least-squares slope of the raw counts (sales per day).
    pub slope_per_day: f64,
    /// The scored counts, index 0 = today. Own copy, safe to keep.
    pub daily_counts: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score a window of per-day counts (index 0 = today, 1 = yesterday, ...).
///
/// Negative counts are dampened to zero for stability/trend and excluded
/// from a positive recency total, so hostile quantities cannot push a score
/// out of range.
///
/// # Errors
///
/// Returns [`ScoreError::TooFewDays`] when `daily_counts` has fewer than two
/// entries.
#[allow(clippy::cast_precision_loss)]
pub fn score_daily_counts(daily_counts: &[i64], params: &Params) -> Result<Consistency, ScoreError> {
    let n = daily_counts.len();
    if n < 2 {
        return Err(ScoreError::TooFewDays(n));
    }

    let raw: Vec<f64> = daily_counts.iter().map(|&c| c as f64).collect();
    let dampened: Vec<f64> = daily_counts
        .iter()
        .map(|&c| (c.max(0) as f64).ln_1p())
        .collect();

    // Stability: inverse of the coefficient of variation on the dampened
    // series. cv = 0 → 1.0; larger cv approaches 0 without a hard cliff.
    let mean_log = mean(&dampened);
    let std_log = std_dev(&dampened, mean_log);
    let cv = (std_log / (mean_log + EPSILON)).max(0.0);
    let stability = 1.0 / (1.0 + cv);

    // Recency: decayed total over plain total of the raw counts. All sales
    // today → 1.0; an empty (or non-positive) window → 0, never NaN.
    let total: f64 = raw.iter().sum();
    let decayed: f64 = raw
        .iter()
        .enumerate()
        .map(|(d, &c)| c * (-params.lambda * d as f64).exp())
        .sum();
    let recency = if total <= 0.0 {
        0.0
    } else {
        clamp01(decayed / total)
    };

    // Trend: relative slope of the dampened series, softened so a steep line
    // approaches 0 without slamming into it. Flat → 1.0.
    let slope_log = regression_slope(&dampened);
    let rel_slope = if mean_log <= 0.0 {
        0.0
    } else {
        slope_log / (mean_log + EPSILON)
    };
    let steepness = rel_slope.abs() / params.max_slope;
    let trend = 1.0 / (1.0 + steepness);

    let wsum = params.weights.sum();
    let divisor = if wsum == 0.0 { 1.0 } else { wsum };
    let final_score = clamp01(
        (params.weights.stability * stability
            + params.weights.recency * recency
            + params.weights.trend * trend)
            / divisor,
    );

    let mean_raw = mean(&raw);
    Ok(Consistency {
        final_score,
        stability,
        recency,
        trend,
        mean_per_day: mean_raw,
        std_dev_per_day: std_dev(&raw, mean_raw),
        slope_per_day: regression_slope(&raw),
        daily_counts: daily_counts.to_vec(),
    })
}

/// Bucket purchase records by calendar day, then score the window.
///
/// # Errors
///
/// Returns [`ScoreError::TooFewDays`] when the configured window is shorter
/// than two days.
pub fn score_records<Tz: TimeZone>(
    records: &[PurchaseRecord],
    params: &Params,
    now: DateTime<Utc>,
    zone: &Tz,
) -> Result<Consistency, ScoreError> {
    if params.window_days < 2 {
        return Err(ScoreError::TooFewDays(params.window_days));
    }
    let counts = bucket::day_buckets_for_records(records, params.window_days, now, zone)?;
    score_daily_counts(&counts, params)
}

// ---------------------------------------------------------------------------
// Small math helpers
// ---------------------------------------------------------------------------

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation (not sample).
#[allow(clippy::cast_precision_loss)]
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Ordinary least-squares slope with `x = 0..n-1`, via the closed form
/// `slope = (nΣxy − ΣxΣy) / (nΣx² − (Σx)²)`. Zero on degenerate input.
#[allow(clippy::cast_precision_loss)]
fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let n = n as f64;
    let denom = n * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
