//! Purchase record model and single-line codec.
//!
//! One purchase per line, five colon-separated fields:
//!
//! ```text
//! {epoch_millis}:{buyer_uuid}:{buyer_name}:{item_name}:{quantity}
//! ```
//!
//! Guarantees:
//!
//! - One-line invariant: no literal `\n` or `\r` in a serialized record.
//! - The delimiter never appears inside a field: [`to_line`] rejects records
//!   whose string fields contain `:` instead of emitting a line that cannot
//!   be split back apart.
//! - Deterministic: the same record always produces the same output bytes.
//!
//! Reads are more tolerant than writes: item names that are not canonical
//! resolve to [`ItemKind::unknown`] rather than failing, so a ledger written
//! against a newer item catalog still replays on an older one.

use std::fmt;

use uuid::Uuid;

/// Number of colon-separated fields in a serialized record.
pub const RECORD_FIELDS: usize = 5;

/// The field delimiter. Not escaped anywhere, which is why [`to_line`]
/// refuses string fields containing it.
const DELIM: char = ':';

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or decoding a purchase line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Line has the wrong number of colon-separated fields.
    #[error("expected {RECORD_FIELDS} ':'-separated fields, found {found}")]
    FieldCount {
        /// Number of fields found.
        found: usize,
    },

    /// The timestamp field is not a valid i64.
    #[error("invalid timestamp (not i64 millis): '{0}'")]
    InvalidTimestamp(String),

    /// The buyer identifier is not a valid UUID string.
    #[error("invalid buyer id: '{0}'")]
    InvalidBuyerId(String),

    /// The quantity field is not a valid i64.
    #[error("invalid quantity (not i64): '{0}'")]
    InvalidQuantity(String),

    /// A string field contains the field delimiter.
    #[error("field '{field}' contains the ':' delimiter")]
    DelimiterInField {
        /// Which field carried the delimiter.
        field: &'static str,
    },

    /// A string field contains a line break, violating the one-line invariant.
    #[error("field '{field}' contains a line break")]
    NewlineInField {
        /// Which field carried the line break.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Identifier newtypes
// ---------------------------------------------------------------------------

/// Stable buyer identifier. Opaque to the core; in practice the host
/// account UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuyerId(Uuid);

impl BuyerId {
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

impl fmt::Display for BuyerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Categorical item identifier, stored as a canonical upper-snake name
/// (`OAK_LOG`, `GOLD_INGOT`, ...).
///
/// The catalog of names is owned by the host and evolves independently of
/// written ledgers, so parsing never fails: anything that is not a canonical
/// name maps to the [`ItemKind::unknown`] sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKind(String);

/// Sentinel name for unrecognized item types.
const UNKNOWN_ITEM: &str = "UNKNOWN";

impl ItemKind {
    /// Resolve a name to an item kind. Non-canonical names (empty, lowercase,
    /// punctuation other than `_`) resolve to the unknown sentinel.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if is_canonical_item_name(name) {
            Self(name.to_string())
        } else {
            Self::unknown()
        }
    }

    /// The sentinel kind for names this build does not recognize.
    #[must_use]
    pub fn unknown() -> Self {
        Self(UNKNOWN_ITEM.to_string())
    }

    /// Canonical name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unknown sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ITEM
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical item names are non-empty upper-snake ASCII.
fn is_canonical_item_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

// ---------------------------------------------------------------------------
// PurchaseRecord
// ---------------------------------------------------------------------------

/// One completed sale. Immutable value; the ledger appends these verbatim.
///
/// `timestamp_ms` is wall-clock milliseconds since the Unix epoch. Callers
/// normally append in chronological order but nothing enforces it; readers
/// must tolerate out-of-order timestamps.
///
/// `quantity` is ≥ 0 by convention. The codec does not reject negative
/// values; downstream consumers treat them as hostile input (the scorer
/// dampens them to zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    /// Sale completion time, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Stable buyer identifier.
    pub buyer_id: BuyerId,
    /// Buyer display name at sale time. May be blank or stale.
    pub buyer_name: String,
    /// What was sold.
    pub item: ItemKind,
    /// How many were sold.
    pub quantity: i64,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serialize a record to a single line (without trailing newline).
///
/// # Errors
///
/// Returns [`RecordError::DelimiterInField`] or
/// [`RecordError::NewlineInField`] if `buyer_name` or the item name would
/// corrupt the line format. The numeric fields cannot fail.
pub fn to_line(record: &PurchaseRecord) -> Result<String, RecordError> {
    check_field("buyer_name", &record.buyer_name)?;
    check_field("item", record.item.as_str())?;

    Ok(format!(
        "{}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
        record.timestamp_ms, record.buyer_id, record.buyer_name, record.item, record.quantity,
    ))
}

/// Serialize a record to a newline-terminated line, ready to append.
///
/// # Errors
///
/// Same as [`to_line`].
pub fn write_line(record: &PurchaseRecord) -> Result<String, RecordError> {
    let mut line = to_line(record)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line into a [`PurchaseRecord`].
///
/// Expects exactly [`RECORD_FIELDS`] colon-separated fields. The buyer name
/// may be empty; the item name falls back to [`ItemKind::unknown`] when it is
/// not canonical.
///
/// # Errors
///
/// Returns a [`RecordError`] variant naming the first field that failed to
/// parse.
pub fn parse_line(line: &str) -> Result<PurchaseRecord, RecordError> {
    let fields: Vec<&str> = line.split(DELIM).collect();
    if fields.len() != RECORD_FIELDS {
        return Err(RecordError::FieldCount {
            found: fields.len(),
        });
    }

    let timestamp_ms: i64 = fields[0]
        .parse()
        .map_err(|_| RecordError::InvalidTimestamp(fields[0].to_string()))?;

    let buyer_id = Uuid::parse_str(fields[1])
        .map(BuyerId::new)
        .map_err(|_| RecordError::InvalidBuyerId(fields[1].to_string()))?;

    let buyer_name = fields[2].to_string();
    let item = ItemKind::parse(fields[3]);

    let quantity: i64 = fields[4]
        .parse()
        .map_err(|_| RecordError::InvalidQuantity(fields[4].to_string()))?;

    Ok(PurchaseRecord {
        timestamp_ms,
        buyer_id,
        buyer_name,
        item,
        quantity,
    })
}

fn check_field(name: &'static str, value: &str) -> Result<(), RecordError> {
    if value.contains(DELIM) {
        return Err(RecordError::DelimiterInField { field: name });
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(RecordError::NewlineInField { field: name });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
