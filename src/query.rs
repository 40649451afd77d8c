//! Read-only accessors: balances and bounded per-season history.

use chrono::Utc;
use rusqlite::params;

use crate::config::MAX_HISTORY_LIMIT;
use crate::error::{LedgerError, Result};
use crate::models::{LedgerAction, LedgerEntry, UserBalance};
use crate::store::{self, PointsStore};

impl PointsStore {
    /// Current balance, creating the user with 0 points on first reference.
    pub fn balance(&self, user_id: i64) -> Result<i64> {
        Ok(self.user_record(user_id)?.points)
    }

    /// Full balance record including creation/update timestamps. Creates the
    /// user lazily like [`balance`](Self::balance).
    pub fn user_record(&self, user_id: i64) -> Result<UserBalance> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        store::ensure_user(&conn, user_id, &now)?;

        let record = conn.query_row(
            "SELECT user_id, points, created_at, updated_at
             FROM user_points WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(UserBalance {
                    user_id: row.get(0)?,
                    points: row.get(1)?,
                    created_at: store::parse_utc(2, &row.get::<_, String>(2)?)?,
                    updated_at: store::parse_utc(3, &row.get::<_, String>(3)?)?,
                })
            },
        )?;
        Ok(record)
    }

    /// A user's ledger entries for one season, newest first. `limit` is
    /// clamped to 1..=20; entries from other seasons are never returned.
    pub fn history(&self, user_id: i64, season_id: i64, limit: usize) -> Result<Vec<LedgerEntry>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let conn = self.conn.lock();

        let known: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM seasons WHERE id = ?1)",
            [season_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(LedgerError::SeasonNotFound(season_id));
        }

        let mut stmt = conn.prepare(
            "SELECT id, season_id, user_id, actor_id, action, delta,
                    balance_before, balance_after, note, created_at
             FROM ledger
             WHERE user_id = ?1 AND season_id = ?2
             ORDER BY id DESC
             LIMIT ?3",
        )?;
        let entries = stmt
            .query_map(params![user_id, season_id, limit as i64], |row| {
                let action_text: String = row.get(4)?;
                let action = LedgerAction::parse(&action_text).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        format!("unknown ledger action '{action_text}'").into(),
                    )
                })?;
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    season_id: row.get(1)?,
                    user_id: row.get(2)?,
                    actor_id: row.get(3)?,
                    action,
                    delta: row.get(5)?,
                    balance_before: row.get(6)?,
                    balance_after: row.get(7)?,
                    note: row.get(8)?,
                    created_at: store::parse_utc(9, &row.get::<_, String>(9)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    fn test_store() -> PointsStore {
        PointsStore::open_in_memory(LedgerConfig::default()).unwrap()
    }

    #[test]
    fn unknown_user_reads_zero_without_duplicating_rows() {
        let store = test_store();
        assert_eq!(store.balance(5).unwrap(), 0);
        assert_eq!(store.balance(5).unwrap(), 0);

        let rows: i64 = store
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM user_points WHERE user_id = 5",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn lazy_creation_writes_no_ledger_entry() {
        let store = test_store();
        store.balance(5).unwrap();
        let season = store.current_season().unwrap();
        assert!(store.history(5, season.id, 10).unwrap().is_empty());
    }

    #[test]
    fn user_record_tracks_updates() {
        let store = test_store();
        let created = store.user_record(8).unwrap();
        assert_eq!(created.points, 0);
        assert_eq!(created.created_at, created.updated_at);

        store
            .apply_delta(8, 10, LedgerAction::Award, None, None)
            .unwrap();
        let updated = store.user_record(8).unwrap();
        assert_eq!(updated.points, 10);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn history_is_newest_first_and_clamped() {
        let store = test_store();
        for i in 1..=25 {
            store
                .apply_delta(1, i, LedgerAction::Award, None, None)
                .unwrap();
        }
        let season = store.current_season().unwrap();

        let entries = store.history(1, season.id, 50).unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_LIMIT);
        assert_eq!(entries[0].delta, 25); // newest first
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));

        let entries = store.history(1, season.id, 3).unwrap();
        assert_eq!(entries.len(), 3);

        // Zero clamps up to one entry, not an empty page.
        let entries = store.history(1, season.id, 0).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn history_rejects_unknown_season() {
        let store = test_store();
        let err = store.history(1, 9999, 10).unwrap_err();
        assert!(matches!(err, LedgerError::SeasonNotFound(9999)));
    }

    #[test]
    fn history_captures_notes_and_actors() {
        let store = test_store();
        store
            .apply_delta(1, 50, LedgerAction::Award, Some("tournament win"), Some(7))
            .unwrap();
        let season = store.current_season().unwrap();

        let entries = store.history(1, season.id, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].note.as_deref(), Some("tournament win"));
        assert_eq!(entries[0].actor_id, Some(7));
        assert_eq!(entries[0].season_id, season.id);
    }
}
