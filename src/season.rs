//! Season lifecycle: bootstrap, current-season lookup, progress.
//!
//! Seasons are append-only; the current one is simply the row with the
//! greatest id. After bootstrap, new seasons are only ever created by
//! [`PointsStore::reset_all`](crate::store::PointsStore).

use chrono::Utc;
use rusqlite::TransactionBehavior;

use crate::calendar;
use crate::error::Result;
use crate::models::{Season, SeasonStatus};
use crate::store::{self, PointsStore};

impl PointsStore {
    /// The season with the greatest id. Bootstraps the first season,
    /// anchored at the current ISO week, if none exists yet.
    pub fn current_season(&self) -> Result<Season> {
        let now = Utc::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let season = store::current_season_tx(&tx, self.config.season_length_weeks, now)?;
        tx.commit()?;
        Ok(season)
    }

    /// Current season plus elapsed and remaining weeks.
    pub fn season_status(&self) -> Result<SeasonStatus> {
        let season = self.current_season()?;
        let (now_year, now_week) = calendar::iso_week(Utc::now());
        let elapsed_weeks =
            calendar::weeks_between(season.start_year, season.start_week, now_year, now_week)?;
        let remaining_weeks =
            (i64::from(self.config.season_length_weeks) - 1 - elapsed_weeks).max(0);

        Ok(SeasonStatus {
            season,
            elapsed_weeks,
            remaining_weeks,
        })
    }
}
