//! Seasonal points ledger over SQLite.
//!
//! Maintains per-user point balances inside recurring fixed-length seasons
//! (default 24 ISO weeks) with an append-only audit ledger of every change.
//! Command dispatchers (chat bots etc.) validate input, call into this crate,
//! and render the returned records; this crate owns the invariants: balances
//! never go negative, every mutation lands atomically with its ledger entry,
//! and a season reset zeroes everyone while preserving history.
//!
//! ```no_run
//! use points_ledger::{LedgerAction, LedgerConfig, PointsStore};
//!
//! # fn main() -> points_ledger::Result<()> {
//! let store = PointsStore::open(LedgerConfig::from_env())?;
//! let out = store.apply_delta(1234, 50, LedgerAction::Award, Some("event win"), Some(42))?;
//! assert_eq!(out.balance_after, out.balance_before + 50);
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod query;
pub mod season;
pub mod store;

pub use config::{LedgerConfig, DEFAULT_SEASON_LENGTH_WEEKS, MAX_HISTORY_LIMIT};
pub use error::{LedgerError, Result};
pub use models::{
    DeltaOutcome, LedgerAction, LedgerEntry, Season, SeasonReset, SeasonStatus, UserBalance,
};
pub use store::PointsStore;
