//! Monthly consistency archive.
//!
//! One CSV per month under the archive root, named `YYYY-MM.csv`:
//!
//! ```text
//! Player,Week1,Week2,Week3,Week4,Grand,Month
//! Alice,0.8000,0.6000,,,0.7000,2025-09
//! ```
//!
//! - One row per shop owner, matched case-insensitively, kept sorted by name.
//! - Week cells are scores formatted to 4 decimal places, or empty.
//! - `Grand` is recomputed on every write as the mean of the non-empty week
//!   cells; a row with no weeks has an empty grand, not `0.0000`.
//! - Each upsert rewrites the whole table to a temp file and renames it over
//!   the original, so a failed write leaves the previous table intact. The
//!   cadence is weekly, so the full rewrite is cheap.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

/// CSV header line.
pub const ARCHIVE_HEADER: &str = "Player,Week1,Week2,Week3,Week4,Grand,Month";

/// Weekly columns per month.
pub const WEEKS_PER_MONTH: usize = 4;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while updating the archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// File system failure on read, write, or rename.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    /// Week index outside `1..=4`.
    #[error("week index must be 1..=4, got {0}")]
    InvalidWeekIndex(u8),

    /// Month outside `1..=12`.
    #[error("month must be 1..=12, got {0}")]
    InvalidMonth(u32),

    /// Owner name that would corrupt the table (empty, or containing the
    /// cell delimiter or a line break).
    #[error("owner name unusable as a table key: '{0}'")]
    InvalidOwnerName(String),
}

// ---------------------------------------------------------------------------
// MonthKey
// ---------------------------------------------------------------------------

/// A calendar month, used as the archive file key (`2025-09`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a month key, validating the month number.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidMonth`] when `month` is not `1..=12`.
    pub const fn new(year: i32, month: u32) -> Result<Self, ArchiveError> {
        if month >= 1 && month <= 12 {
            Ok(Self { year, month })
        } else {
            Err(ArchiveError::InvalidMonth(month))
        }
    }

    /// The month containing a calendar date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// `YYYY-MM` label, also used in the `Month` column.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Archive file name for this month.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.label())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ---------------------------------------------------------------------------
// Row model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Row {
    owner: String,
    weeks: [Option<f64>; WEEKS_PER_MONTH],
    grand: Option<f64>,
    month: String,
}

impl Row {
    fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            weeks: [None; WEEKS_PER_MONTH],
            grand: None,
            month: String::new(),
        }
    }

    /// Mean of the non-empty week cells; `None` when every cell is empty.
    #[allow(clippy::cast_precision_loss)]
    fn recompute_grand(&mut self) {
        let filled: Vec<f64> = self.weeks.iter().flatten().copied().collect();
        self.grand = if filled.is_empty() {
            None
        } else {
            Some(filled.iter().sum::<f64>() / filled.len() as f64)
        };
    }

    fn to_csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.owner,
            fmt_cell(self.weeks[0]),
            fmt_cell(self.weeks[1]),
            fmt_cell(self.weeks[2]),
            fmt_cell(self.weeks[3]),
            fmt_cell(self.grand),
            self.month,
        )
    }

    /// Parse one data row; `None` when the column count is short.
    fn from_csv(line: &str) -> Option<Self> {
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() < 7 {
            return None;
        }
        Some(Self {
            owner: cells[0].to_string(),
            weeks: [
                parse_cell(cells[1]),
                parse_cell(cells[2]),
                parse_cell(cells[3]),
                parse_cell(cells[4]),
            ],
            grand: parse_cell(cells[5]),
            month: cells[6].to_string(),
        })
    }
}

fn fmt_cell(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:.4}"))
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        None
    } else {
        cell.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// ConsistencyArchive
// ---------------------------------------------------------------------------

/// Maintains the per-month weekly score tables under a base directory.
///
/// Cheap to clone; holds only the base path. Single-writer-assumed, like the
/// ledgers: concurrent upserts of the same month are last-writer-wins.
#[derive(Debug, Clone)]
pub struct ConsistencyArchive {
    base_dir: PathBuf,
}

impl ConsistencyArchive {
    /// Create an archive rooted at `base_dir`. Directories are created
    /// lazily on first write.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory holding the month files.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the table for one month.
    #[must_use]
    pub fn month_path(&self, month: MonthKey) -> PathBuf {
        self.base_dir.join(month.file_name())
    }

    /// Upsert one weekly score: find-or-create the owner's row
    /// (case-insensitive), set the week's cell, recompute the grand mean,
    /// and rewrite the table sorted by owner name.
    ///
    /// # Errors
    ///
    /// Rejects week indexes outside `1..=4` and owner names that would
    /// corrupt the table; propagates I/O failures. A failed rewrite leaves
    /// the previous table untouched.
    pub fn record_weekly_score(
        &self,
        owner: &str,
        month: MonthKey,
        week_index: u8,
        score: f64,
    ) -> Result<(), ArchiveError> {
        if !(1..=4).contains(&week_index) {
            return Err(ArchiveError::InvalidWeekIndex(week_index));
        }
        if owner.is_empty() || owner.contains(',') || owner.contains('\n') || owner.contains('\r') {
            return Err(ArchiveError::InvalidOwnerName(owner.to_string()));
        }

        fs::create_dir_all(&self.base_dir)?;

        let path = self.month_path(month);
        let mut rows = if path.exists() {
            read_rows(&path)?
        } else {
            Vec::new()
        };

        let idx = rows
            .iter()
            .position(|r| r.owner.eq_ignore_ascii_case(owner))
            .unwrap_or_else(|| {
                rows.push(Row::new(owner));
                rows.len() - 1
            });
        rows[idx].weeks[usize::from(week_index) - 1] = Some(score);
        rows[idx].recompute_grand();

        let label = month.label();
        for r in &mut rows {
            r.month.clone_from(&label);
        }
        rows.sort_by_key(|r| r.owner.to_lowercase());

        write_rows(&path, &rows)
    }
}

fn read_rows(path: &Path) -> Result<Vec<Row>, ArchiveError> {
    let content = fs::read_to_string(path)?;
    // Skip the header; short rows are dropped rather than failing the table.
    Ok(content
        .lines()
        .skip(1)
        .filter_map(Row::from_csv)
        .collect())
}

fn write_rows(path: &Path, rows: &[Row]) -> Result<(), ArchiveError> {
    let mut out = String::new();
    out.push_str(ARCHIVE_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.to_csv());
        out.push('\n');
    }

    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, out)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConsistencyArchive) {
        let tmp = TempDir::new().expect("tempdir");
        let archive = ConsistencyArchive::new(tmp.path().join("consistency"));
        (tmp, archive)
    }

    fn september() -> MonthKey {
        MonthKey::new(2025, 9).expect("valid month")
    }

    // -----------------------------------------------------------------------
    // MonthKey
    // -----------------------------------------------------------------------

    #[test]
    fn month_key_label_and_file_name() {
        let key = september();
        assert_eq!(key.label(), "2025-09");
        assert_eq!(key.file_name(), "2025-09.csv");
        assert_eq!(key.to_string(), "2025-09");
    }

    #[test]
    fn month_key_rejects_bad_months() {
        assert!(matches!(
            MonthKey::new(2025, 0),
            Err(ArchiveError::InvalidMonth(0))
        ));
        assert!(matches!(
            MonthKey::new(2025, 13),
            Err(ArchiveError::InvalidMonth(13))
        ));
    }

    #[test]
    fn month_key_from_date() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 15).expect("valid date");
        assert_eq!(MonthKey::from_date(date), september());
    }

    // -----------------------------------------------------------------------
    // Upsert
    // -----------------------------------------------------------------------

    #[test]
    fn upsert_two_weeks_recomputes_grand() {
        let (_tmp, archive) = setup();
        archive
            .record_weekly_score("Alice", september(), 1, 0.8)
            .expect("week 1");
        archive
            .record_weekly_score("Alice", september(), 2, 0.6)
            .expect("week 2");

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        assert_eq!(
            content,
            "Player,Week1,Week2,Week3,Week4,Grand,Month\n\
             Alice,0.8000,0.6000,,,0.7000,2025-09\n"
        );
    }

    #[test]
    fn upsert_overwrites_same_week() {
        let (_tmp, archive) = setup();
        archive
            .record_weekly_score("Alice", september(), 1, 0.2)
            .expect("first");
        archive
            .record_weekly_score("Alice", september(), 1, 0.9)
            .expect("second");

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        assert!(content.contains("Alice,0.9000,,,,0.9000,2025-09"));
    }

    #[test]
    fn owner_match_is_case_insensitive() {
        let (_tmp, archive) = setup();
        archive
            .record_weekly_score("Alice", september(), 1, 0.8)
            .expect("week 1");
        archive
            .record_weekly_score("ALICE", september(), 2, 0.6)
            .expect("week 2");

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        // One row, first-seen spelling preserved.
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("Alice,0.8000,0.6000,,,0.7000,2025-09"));
    }

    #[test]
    fn rows_sort_case_insensitively_by_owner() {
        let (_tmp, archive) = setup();
        for (owner, week, score) in [("mallory", 1, 0.1), ("Alice", 1, 0.9), ("bob", 1, 0.5)] {
            archive
                .record_weekly_score(owner, september(), week, score)
                .expect("record");
        }

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        let owners: Vec<&str> = content
            .lines()
            .skip(1)
            .filter_map(|l| l.split(',').next())
            .collect();
        assert_eq!(owners, vec!["Alice", "bob", "mallory"]);
    }

    #[test]
    fn separate_months_use_separate_files() {
        let (_tmp, archive) = setup();
        let october = MonthKey::new(2025, 10).expect("valid month");
        archive
            .record_weekly_score("Alice", september(), 4, 0.4)
            .expect("september");
        archive
            .record_weekly_score("Alice", october, 1, 0.6)
            .expect("october");

        assert!(archive.month_path(september()).exists());
        assert!(archive.month_path(october).exists());
        let oct = fs::read_to_string(archive.month_path(october)).expect("read");
        assert!(oct.contains("Alice,0.6000,,,,0.6000,2025-10"));
    }

    #[test]
    fn rewrite_leaves_no_temp_file() {
        let (_tmp, archive) = setup();
        archive
            .record_weekly_score("Alice", september(), 1, 0.8)
            .expect("record");
        assert!(
            !archive
                .month_path(september())
                .with_extension("csv.tmp")
                .exists()
        );
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_week_index_out_of_range() {
        let (_tmp, archive) = setup();
        for bad in [0u8, 5, 200] {
            let err = archive
                .record_weekly_score("Alice", september(), bad, 0.5)
                .expect_err("should reject");
            assert!(matches!(err, ArchiveError::InvalidWeekIndex(_)));
        }
    }

    #[test]
    fn rejects_unusable_owner_names() {
        let (_tmp, archive) = setup();
        for bad in ["", "a,b", "a\nb"] {
            let err = archive
                .record_weekly_score(bad, september(), 1, 0.5)
                .expect_err("should reject");
            assert!(matches!(err, ArchiveError::InvalidOwnerName(_)));
        }
    }

    // -----------------------------------------------------------------------
    // Reload tolerance
    // -----------------------------------------------------------------------

    #[test]
    fn short_rows_in_existing_file_are_dropped() {
        let (_tmp, archive) = setup();
        fs::create_dir_all(archive.base_dir()).expect("dirs");
        fs::write(
            archive.month_path(september()),
            "Player,Week1,Week2,Week3,Week4,Grand,Month\nmangled,0.5\n",
        )
        .expect("write");

        archive
            .record_weekly_score("Alice", september(), 1, 0.8)
            .expect("record");

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("Alice"));
        assert!(!content.contains("mangled"));
    }

    #[test]
    fn grand_is_empty_when_no_weeks_survive_reload() {
        let (_tmp, archive) = setup();
        fs::create_dir_all(archive.base_dir()).expect("dirs");
        // A hand-edited row with no week cells at all.
        fs::write(
            archive.month_path(september()),
            "Player,Week1,Week2,Week3,Week4,Grand,Month\nBob,,,,,,2025-09\n",
        )
        .expect("write");

        archive
            .record_weekly_score("Alice", september(), 1, 0.8)
            .expect("record");

        let content = fs::read_to_string(archive.month_path(september())).expect("read");
        assert!(content.contains("Bob,,,,,,2025-09"));
    }
}
