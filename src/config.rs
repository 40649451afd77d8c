//! Runtime configuration with environment overrides.

use std::env;

/// Default season length in ISO weeks.
pub const DEFAULT_SEASON_LENGTH_WEEKS: u32 = 24;

/// Hard cap on history page size.
pub const MAX_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Season length in ISO weeks, at least 1.
    pub season_length_weeks: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: "points.db".to_string(),
            season_length_weeks: DEFAULT_SEASON_LENGTH_WEEKS,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from the environment (`LEDGER_DB_PATH`,
    /// `LEDGER_SEASON_WEEKS`), falling back to defaults. Unparseable or
    /// zero-length overrides are ignored.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let db_path = env::var("LEDGER_DB_PATH").unwrap_or_else(|_| "points.db".to_string());
        let season_length_weeks = env::var("LEDGER_SEASON_WEEKS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|w| *w >= 1)
            .unwrap_or(DEFAULT_SEASON_LENGTH_WEEKS);

        Self {
            db_path,
            season_length_weeks,
        }
    }

    /// Same configuration pointed at a different database file. Handy for
    /// tests and one-off tools.
    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }
}
