//! TOML configuration for the ledger, archive, and scoring stack.
//!
//! Every field has a serde default, so a missing file or an empty table
//! yields stock behavior. Example:
//!
//! ```toml
//! [ledger]
//! data_dir = "data/purchase_transactions"
//! durable_appends = true
//!
//! [scoring]
//! window_days = 7
//! tail_weight = 0.10
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            archive: ArchiveConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl TallyConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails with context if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Fails only when the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Where and how purchase ledgers are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding one `<shop-uuid>.txt` file per shop.
    #[serde(default = "default_ledger_dir")]
    pub data_dir: PathBuf,
    /// `sync_data` after every append. Off by default.
    #[serde(default)]
    pub durable_appends: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_ledger_dir(),
            durable_appends: false,
        }
    }
}

/// Where the monthly consistency tables are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding one `YYYY-MM.csv` file per month.
    #[serde(default = "default_archive_dir")]
    pub data_dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_archive_dir(),
        }
    }
}

/// Consistency scoring parameters. `tally-score` turns this into its
/// parameter struct; the defaults match the stock scoring model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// How many days back the score looks. Index 0 is today.
    #[serde(default = "default_window_days")]
    pub window_days: usize,
    /// Fraction of today's recency weight retained by the oldest in-window
    /// day; the decay rate is derived from this.
    #[serde(default = "default_tail_weight")]
    pub tail_weight: f64,
    /// Relative slope magnitude treated as "very steep" by the trend signal.
    #[serde(default = "default_max_slope")]
    pub max_slope: f64,
    /// Blend weights for the three component signals.
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            tail_weight: default_tail_weight(),
            max_slope: default_max_slope(),
            weights: WeightsConfig::default(),
        }
    }
}

/// Blend weights. Need not sum to 1; the scorer normalizes by the sum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_stability_weight")]
    pub stability: f64,
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
    #[serde(default = "default_trend_weight")]
    pub trend: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            stability: default_stability_weight(),
            recency: default_recency_weight(),
            trend: default_trend_weight(),
        }
    }
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("data/purchase_transactions")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("data/consistency")
}

const fn default_window_days() -> usize {
    7
}

const fn default_tail_weight() -> f64 {
    0.10
}

const fn default_max_slope() -> f64 {
    0.25
}

const fn default_stability_weight() -> f64 {
    0.30
}

const fn default_recency_weight() -> f64 {
    0.40
}

const fn default_trend_weight() -> f64 {
    0.30
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
