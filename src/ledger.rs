//! The mutation path: balance deltas and season-rollover resets.
//!
//! Every mutation runs as one IMMEDIATE transaction so the balance read, the
//! non-negativity check, the balance write and the ledger append are
//! indivisible. On any error the transaction unwinds by rollback-on-drop and
//! nothing is written.

use chrono::Utc;
use rusqlite::{params, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::models::{DeltaOutcome, LedgerAction, SeasonReset};
use crate::store::{self, PointsStore};

/// Note attached to every system-written reset entry.
const RESET_NOTE: &str = "season reset";

impl PointsStore {
    /// Apply a signed delta to a user's balance and record it in the ledger.
    ///
    /// Awards must carry a positive delta and deductions a negative one;
    /// anything else is rejected with [`LedgerError::InvalidAmount`] before
    /// the store is touched. A deduction that would drive the balance below
    /// zero fails with [`LedgerError::InsufficientBalance`] and leaves no
    /// trace.
    pub fn apply_delta(
        &self,
        user_id: i64,
        delta: i64,
        action: LedgerAction,
        note: Option<&str>,
        actor_id: Option<i64>,
    ) -> Result<DeltaOutcome> {
        match action {
            LedgerAction::Award if delta > 0 => {}
            LedgerAction::Deduct if delta < 0 => {}
            _ => return Err(LedgerError::InvalidAmount { delta, action }),
        }

        let now = Utc::now();
        let now_text = now.to_rfc3339();

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let season = store::current_season_tx(&tx, self.config.season_length_weeks, now)?;
        store::ensure_user(&tx, user_id, &now_text)?;

        let before: i64 = tx.query_row(
            "SELECT points FROM user_points WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        let after = before + delta;

        if after < 0 {
            return Err(LedgerError::InsufficientBalance {
                balance: before,
                delta,
            });
        }

        tx.execute(
            "UPDATE user_points SET points = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![after, now_text, user_id],
        )?;
        tx.execute(
            "INSERT INTO ledger
                (season_id, user_id, actor_id, action, delta, balance_before, balance_after, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                season.id,
                user_id,
                actor_id,
                action.as_str(),
                delta,
                before,
                after,
                note,
                now_text,
            ],
        )?;
        tx.commit()?;

        debug!(
            user_id,
            action = action.as_str(),
            delta,
            before,
            after,
            season_id = season.id,
            "applied balance delta"
        );

        Ok(DeltaOutcome {
            balance_before: before,
            balance_after: after,
            season_id: season.id,
        })
    }

    /// Start a new season and zero every known balance, writing one `reset`
    /// ledger entry per user under the new season id. One transaction: either
    /// the season exists and everyone is reset, or nothing happened.
    pub fn reset_all(&self, actor_id: Option<i64>) -> Result<SeasonReset> {
        let now = Utc::now();
        let now_text = now.to_rfc3339();

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let season = store::insert_season(&tx, self.config.season_length_weeks, now)?;

        let users: Vec<(i64, i64)> = {
            let mut stmt = tx.prepare("SELECT user_id, points FROM user_points")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        for &(user_id, before) in &users {
            tx.execute(
                "UPDATE user_points SET points = 0, updated_at = ?1 WHERE user_id = ?2",
                params![now_text, user_id],
            )?;
            tx.execute(
                "INSERT INTO ledger
                    (season_id, user_id, actor_id, action, delta, balance_before, balance_after, note, created_at)
                 VALUES (?1, ?2, ?3, 'reset', ?4, ?5, 0, ?6, ?7)",
                params![season.id, user_id, actor_id, -before, before, RESET_NOTE, now_text],
            )?;
        }
        tx.commit()?;

        info!(
            season_id = season.id,
            users_reset = users.len(),
            start = %season.start_label(),
            end = %season.end_label(),
            "season reset complete"
        );

        Ok(SeasonReset {
            season_id: season.id,
            start_label: season.start_label(),
            end_label: season.end_label(),
            users_reset: users.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    fn test_store() -> PointsStore {
        PointsStore::open_in_memory(LedgerConfig::default()).unwrap()
    }

    fn ledger_rows(store: &PointsStore, user_id: i64) -> i64 {
        store
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM ledger WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn award_then_deduct() {
        let store = test_store();

        let out = store
            .apply_delta(1, 50, LedgerAction::Award, Some("won event"), Some(99))
            .unwrap();
        assert_eq!(out.balance_before, 0);
        assert_eq!(out.balance_after, 50);

        let out = store
            .apply_delta(1, -30, LedgerAction::Deduct, None, Some(99))
            .unwrap();
        assert_eq!(out.balance_before, 50);
        assert_eq!(out.balance_after, 20);

        assert_eq!(store.balance(1).unwrap(), 20);
        assert_eq!(ledger_rows(&store, 1), 2);
    }

    #[test]
    fn balance_equals_sum_of_applied_deltas() {
        let store = test_store();
        let deltas = [10, 25, -5, 100, -40];
        for &d in &deltas {
            let action = if d > 0 {
                LedgerAction::Award
            } else {
                LedgerAction::Deduct
            };
            store.apply_delta(7, d, action, None, None).unwrap();
        }
        assert_eq!(store.balance(7).unwrap(), deltas.iter().sum::<i64>());

        let season = store.current_season().unwrap();
        let history = store.history(7, season.id, 1).unwrap();
        assert_eq!(history[0].balance_after, deltas.iter().sum::<i64>());
    }

    #[test]
    fn insufficient_balance_leaves_no_trace() {
        let store = test_store();
        store
            .apply_delta(1, 50, LedgerAction::Award, None, None)
            .unwrap();

        let err = store
            .apply_delta(1, -70, LedgerAction::Deduct, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                balance: 50,
                delta: -70
            }
        ));

        assert_eq!(store.balance(1).unwrap(), 50);
        assert_eq!(ledger_rows(&store, 1), 1);
    }

    #[test]
    fn failed_deduction_on_unknown_user_creates_nothing() {
        let store = test_store();
        let err = store
            .apply_delta(404, -10, LedgerAction::Deduct, None, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        // The lazy user row from inside the failed transaction rolled back too.
        let users: i64 = store
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM user_points WHERE user_id = 404",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(users, 0);
        assert_eq!(ledger_rows(&store, 404), 0);
    }

    #[test]
    fn zero_and_sign_mismatched_deltas_are_rejected() {
        let store = test_store();

        for (delta, action) in [
            (0, LedgerAction::Award),
            (0, LedgerAction::Deduct),
            (-5, LedgerAction::Award),
            (5, LedgerAction::Deduct),
            (10, LedgerAction::Reset),
        ] {
            let err = store.apply_delta(1, delta, action, None, None).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount { .. }));
        }
        assert_eq!(ledger_rows(&store, 1), 0);
    }

    #[test]
    fn reset_all_zeroes_every_user_and_records_one_entry_each() {
        let store = test_store();
        store
            .apply_delta(1, 100, LedgerAction::Award, None, None)
            .unwrap();
        store
            .apply_delta(2, 40, LedgerAction::Award, None, None)
            .unwrap();
        store.balance(3).unwrap(); // zero-balance user, reset entry still expected

        let old_season = store.current_season().unwrap();
        let reset = store.reset_all(Some(99)).unwrap();

        assert_eq!(reset.season_id, old_season.id + 1);
        assert_eq!(reset.users_reset, 3);
        assert_eq!(store.current_season().unwrap().id, reset.season_id);

        for user_id in [1, 2, 3] {
            assert_eq!(store.balance(user_id).unwrap(), 0);
        }

        // Exactly one reset entry per user, with delta = -before.
        let history = store.history(1, reset.season_id, 20).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, LedgerAction::Reset);
        assert_eq!(history[0].delta, -100);
        assert_eq!(history[0].balance_before, 100);
        assert_eq!(history[0].balance_after, 0);
        assert_eq!(history[0].note.as_deref(), Some(RESET_NOTE));
        assert_eq!(history[0].actor_id, Some(99));

        let history = store.history(3, reset.season_id, 20).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta, 0);
    }

    #[test]
    fn reset_labels_use_week_format() {
        let store = test_store();
        let reset = store.reset_all(None).unwrap();
        assert_eq!(reset.start_label.len(), 8);
        assert!(reset.start_label.contains("-W"));
        assert_eq!(reset.end_label.len(), 8);
    }

    #[test]
    fn history_stays_within_one_season() {
        let store = test_store();
        store
            .apply_delta(1, 10, LedgerAction::Award, None, None)
            .unwrap();
        let first_season = store.current_season().unwrap();

        let reset = store.reset_all(None).unwrap();
        store
            .apply_delta(1, 5, LedgerAction::Award, None, None)
            .unwrap();

        let old = store.history(1, first_season.id, 20).unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].action, LedgerAction::Award);
        assert_eq!(old[0].delta, 10);

        let new = store.history(1, reset.season_id, 20).unwrap();
        assert_eq!(new.len(), 2); // reset entry + new award, newest first
        assert_eq!(new[0].action, LedgerAction::Award);
        assert_eq!(new[1].action, LedgerAction::Reset);
    }
}
