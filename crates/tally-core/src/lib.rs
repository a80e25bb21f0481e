//! Durable purchase ledgers for player-run shops.
//!
//! Storage layer of the tally workspace:
//!
//! - [`record`]: the purchase record value type and its single-line codec.
//! - [`ledger`]: one append-only log per shop, with `ACK` checkpoint
//!   markers, full replay, and a backward tail scan for "what's new".
//! - [`archive`]: monthly CSV tables of weekly consistency scores.
//! - [`config`]: TOML configuration with per-field defaults.
//!
//! Scoring lives in the `tally-score` crate, which consumes this one.
//!
//! # Conventions
//!
//! - **Errors**: one `thiserror` enum per module; `anyhow` only at the
//!   config/orchestration edge. I/O failures always propagate.
//! - **Logging**: `tracing` macros; malformed ledger lines are skipped with
//!   a `warn!`, never silently.

pub mod archive;
pub mod config;
pub mod ledger;
pub mod record;

pub use archive::{ArchiveError, ConsistencyArchive, MonthKey};
pub use config::TallyConfig;
pub use ledger::{ACK_MARKER, LedgerError, PurchaseLedger, ShopKey};
pub use record::{BuyerId, ItemKind, PurchaseRecord, RecordError};
