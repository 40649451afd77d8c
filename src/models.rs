//! Public record types shared with the command-dispatch layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of balance change recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerAction {
    Award,
    Deduct,
    /// System-initiated zeroing at season rollover. Never accepted from callers.
    Reset,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::Award => "award",
            LedgerAction::Deduct => "deduct",
            LedgerAction::Reset => "reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "award" => Some(LedgerAction::Award),
            "deduct" => Some(LedgerAction::Deduct),
            "reset" => Some(LedgerAction::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's current point balance. Created lazily with 0 points on first
/// reference; mutated only through the ledger engine; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: i64,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One fixed-length season window. Rows are append-only; the current season
/// is the one with the greatest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub start_year: i32,
    pub start_week: u32,
    pub end_year: i32,
    pub end_week: u32,
    pub created_at: DateTime<Utc>,
}

impl Season {
    /// Start of the window as `YYYY-W##`.
    pub fn start_label(&self) -> String {
        crate::calendar::week_label(self.start_year, self.start_week)
    }

    /// End of the window as `YYYY-W##`.
    pub fn end_label(&self) -> String {
        crate::calendar::week_label(self.end_year, self.end_week)
    }
}

/// Immutable audit record of one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub season_id: i64,
    pub user_id: i64,
    /// Who initiated the change; `None` for system-initiated entries.
    pub actor_id: Option<i64>,
    pub action: LedgerAction,
    pub delta: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful `apply_delta`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeltaOutcome {
    pub balance_before: i64,
    pub balance_after: i64,
    pub season_id: i64,
}

/// Result of a season reset.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonReset {
    pub season_id: i64,
    pub start_label: String,
    pub end_label: String,
    pub users_reset: usize,
}

/// Current season plus progress through it.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonStatus {
    pub season: Season,
    pub elapsed_weeks: i64,
    pub remaining_weeks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_string_round_trip() {
        for action in [LedgerAction::Award, LedgerAction::Deduct, LedgerAction::Reset] {
            assert_eq!(LedgerAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(LedgerAction::parse("transfer"), None);
    }
}
