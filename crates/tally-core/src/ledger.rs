//! Per-shop append-only purchase ledgers with checkpoint markers.
//!
//! Each shop owns one text file under the ledger root, named
//! `<shop-uuid>.txt`. A line is either a serialized [`PurchaseRecord`] or the
//! literal marker [`ACK_MARKER`], a bookmark meaning "everything above this
//! has been seen".
//!
//! # Invariants
//!
//! - Lines strictly after the *last* marker are unacknowledged.
//! - Replay treats marker lines as non-data and skips them regardless of
//!   position; before a compaction a file may hold several.
//! - [`PurchaseLedger::acknowledge`] compacts historical markers into one
//!   fresh marker at end-of-file via a temp-file-and-rename rewrite, so the
//!   original is never left in a half-written state.
//! - Each append is a single `write_all` + flush of one newline-terminated
//!   line.
//!
//! # Concurrency
//!
//! No internal locking. Append and acknowledge against the same shop key must
//! be serialized by the caller; distinct shop keys share nothing and can be
//! processed in parallel. Every operation is synchronous file I/O.
//!
//! # Read tolerance
//!
//! A line that fails to parse is skipped with a warning rather than failing
//! the whole read; one corrupt line must not blank a shop's entire history.
//! I/O errors are never swallowed: a missing file reads as empty, an
//! unreadable file is an error.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::record::{self, PurchaseRecord};

/// The literal checkpoint marker line. Never a data record.
pub const ACK_MARKER: &str = "ACK";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// File system failure on read, write, or rename. Can mean data loss;
    /// always surfaced to the caller.
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record to append violates the line format (delimiter or line
    /// break in a string field).
    #[error(transparent)]
    Record(#[from] record::RecordError),
}

// ---------------------------------------------------------------------------
// ShopKey
// ---------------------------------------------------------------------------

/// Stable shop identifier. Doubles as the ledger file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShopKey(Uuid);

impl ShopKey {
    /// Wrap a raw UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ShopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PurchaseLedger
// ---------------------------------------------------------------------------

/// Manages one append-only purchase log per shop under a root directory.
///
/// Cheap to clone; holds only the root path and the durability flag.
#[derive(Debug, Clone)]
pub struct PurchaseLedger {
    root: PathBuf,
    durable_appends: bool,
}

impl PurchaseLedger {
    /// Create a ledger rooted at `root`. Directories are created lazily on
    /// first append.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durable_appends: false,
        }
    }

    /// Request `sync_data` after every append. Slower, but a crash cannot
    /// lose an acknowledged-to-caller purchase.
    #[must_use]
    pub const fn with_durable_appends(mut self, durable: bool) -> Self {
        self.durable_appends = durable;
        self
    }

    /// Root directory holding the per-shop files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the ledger file for one shop.
    #[must_use]
    pub fn ledger_path(&self, shop: ShopKey) -> PathBuf {
        self.root.join(format!("{shop}.txt"))
    }

    // -----------------------------------------------------------------------
    // Append
    // -----------------------------------------------------------------------

    /// Append one purchase to the shop's file, creating the directory and
    /// file if absent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Record`] if the record violates the line
    /// format, or [`LedgerError::Io`] on write failure.
    pub fn append(&self, shop: ShopKey, record: &PurchaseRecord) -> Result<(), LedgerError> {
        let line = record::write_line(record)?;

        fs::create_dir_all(&self.root)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.ledger_path(shop))?;

        file.write_all(line.as_bytes())?;
        file.flush()?;

        if self.durable_appends {
            file.sync_data()?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// All persisted purchases in file order (append order), skipping marker
    /// and blank lines. A missing file reads as an empty history.
    ///
    /// Lines that fail to parse are skipped with a warning; see the module
    /// docs on read tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file exists but cannot be read.
    pub fn list_all(&self, shop: ShopKey) -> Result<Vec<PurchaseRecord>, LedgerError> {
        let path = self.ledger_path(shop);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let mut records = Vec::new();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line == ACK_MARKER {
                continue;
            }
            match record::parse_line(line) {
                Ok(rec) => records.push(rec),
                Err(err) => warn!(shop = %shop, %err, "skipping unreadable purchase line"),
            }
        }
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Tail scan
    // -----------------------------------------------------------------------

    /// Purchases recorded after the last [`ACK_MARKER`], newest first.
    ///
    /// Scans the file backward from end-of-file, splitting raw bytes into
    /// lines in reverse, and stops at the first marker it meets, so nothing
    /// older than the checkpoint is ever parsed. A file with no marker yields
    /// every parseable line. A trailing partial line (torn write) is treated
    /// like any other line. Malformed lines are skipped with a warning,
    /// consistent with [`Self::list_all`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file exists but cannot be read.
    pub fn unacknowledged(&self, shop: ShopKey) -> Result<Vec<PurchaseRecord>, LedgerError> {
        let path = self.ledger_path(shop);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&path)?;
        let mut records = Vec::new();

        let mut end = data.len();
        while end > 0 {
            let start = data[..end]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |pos| pos + 1);

            let line = String::from_utf8_lossy(&data[start..end]);
            let line = line.trim();

            if line == ACK_MARKER {
                break;
            }
            if !line.is_empty() {
                match record::parse_line(line) {
                    Ok(rec) => records.push(rec),
                    Err(err) => {
                        warn!(shop = %shop, %err, "skipping unreadable purchase line in tail scan");
                    }
                }
            }

            if start == 0 {
                break;
            }
            end = start - 1;
        }

        Ok(records)
    }

    /// Number of purchases recorded after the last marker. Convenience for
    /// "you have N new sales" notifications.
    ///
    /// # Errors
    ///
    /// Same as [`Self::unacknowledged`].
    pub fn unacknowledged_count(&self, shop: ShopKey) -> Result<usize, LedgerError> {
        Ok(self.unacknowledged(shop)?.len())
    }

    // -----------------------------------------------------------------------
    // Checkpoint
    // -----------------------------------------------------------------------

    /// Mark everything currently in the file as seen.
    ///
    /// Copies every non-marker line to a temporary sibling, appends one fresh
    /// marker, and renames over the original, compacting any historical
    /// markers and advancing the checkpoint in one atomic replace. The old
    /// file stays intact until the rename lands. No-op if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] on read, write, or rename failure; a
    /// failed rewrite leaves the original untouched.
    pub fn acknowledge(&self, shop: ShopKey) -> Result<(), LedgerError> {
        let path = self.ledger_path(shop);
        if !path.exists() {
            return Ok(());
        }

        let content = fs::read_to_string(&path)?;

        let mut rewritten = String::with_capacity(content.len() + ACK_MARKER.len() + 1);
        for line in content.lines() {
            if line.trim() != ACK_MARKER {
                rewritten.push_str(line);
                rewritten.push('\n');
            }
        }
        rewritten.push_str(ACK_MARKER);
        rewritten.push('\n');

        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, rewritten)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Remove the shop's ledger file if present. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] on any failure other than the file already
    /// being gone.
    pub fn delete(&self, shop: ShopKey) -> Result<(), LedgerError> {
        match fs::remove_file(self.ledger_path(shop)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
