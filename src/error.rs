//! Typed errors surfaced across the library boundary.

use thiserror::Error;

use crate::models::LedgerAction;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A deduction would drive the balance below zero. Nothing is written:
    /// no ledger row, no balance change.
    #[error("insufficient balance: {balance} held, change of {delta} requested")]
    InsufficientBalance { balance: i64, delta: i64 },

    /// Zero delta, or a delta whose sign contradicts the action
    /// (awards must be positive, deductions negative).
    #[error("invalid amount {delta} for action '{action}'")]
    InvalidAmount { delta: i64, action: LedgerAction },

    /// Unknown season id passed to a history query. Users are never
    /// "not found" since balances are created lazily.
    #[error("season {0} not found")]
    SeasonNotFound(i64),

    /// An (ISO year, ISO week) pair that does not exist on the calendar,
    /// e.g. week 53 of a 52-week year.
    #[error("invalid ISO week {year}-W{week:02}")]
    InvalidWeek { year: i32, week: u32 },

    /// Underlying SQLite failure. The enclosing transaction is rolled back;
    /// transient conflicts may be retried by the caller.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
