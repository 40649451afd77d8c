//! SQLite-backed durable store for balances, seasons and the audit ledger.
//!
//! One connection guarded by a mutex is the single serialization point: every
//! logical operation takes the lock once and runs inside one IMMEDIATE
//! transaction, so no caller ever observes a balance mid-mutation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::calendar;
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::models::Season;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS user_points (
    user_id INTEGER PRIMARY KEY,
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS seasons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_year INTEGER NOT NULL,
    start_week INTEGER NOT NULL,
    end_year INTEGER NOT NULL,
    end_week INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    season_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    actor_id INTEGER,
    action TEXT NOT NULL,
    delta INTEGER NOT NULL,
    balance_before INTEGER NOT NULL,
    balance_after INTEGER NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (season_id) REFERENCES seasons(id)
);

CREATE INDEX IF NOT EXISTS idx_ledger_user_season
    ON ledger(user_id, season_id, id DESC);
"#;

/// Shared handle to the points database. Cheap to clone; all clones share
/// the same connection.
#[derive(Clone)]
pub struct PointsStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) config: LedgerConfig,
}

impl PointsStore {
    /// Open (or create) the database, apply the schema, and make sure a
    /// current season exists.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let conn = Connection::open(&config.db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };

        let season = store.current_season()?;
        info!(
            db_path = %store.config.db_path,
            season_id = season.id,
            season_length_weeks = store.config.season_length_weeks,
            "points store opened"
        );
        Ok(store)
    }

    /// In-memory store for tests and ephemeral tooling.
    pub fn open_in_memory(config: LedgerConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        store.current_season()?;
        Ok(store)
    }
}

/// Idempotent zero-balance upsert. Creation is not an economic event, so no
/// ledger row is written here.
pub(crate) fn ensure_user(conn: &Connection, user_id: i64, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_points (user_id, points, created_at, updated_at)
         VALUES (?1, 0, ?2, ?2)",
        params![user_id, now],
    )?;
    Ok(())
}

/// Season with the greatest id, if any season exists yet.
pub(crate) fn latest_season(conn: &Connection) -> rusqlite::Result<Option<Season>> {
    let result = conn.query_row(
        "SELECT id, start_year, start_week, end_year, end_week, created_at
         FROM seasons ORDER BY id DESC LIMIT 1",
        [],
        map_season_row,
    );
    match result {
        Ok(season) => Ok(Some(season)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Insert a season anchored at the ISO week of `now`, with the end week
/// computed from the configured length.
pub(crate) fn insert_season(
    conn: &Connection,
    length_weeks: u32,
    now: DateTime<Utc>,
) -> Result<Season> {
    let (start_year, start_week) = calendar::iso_week(now);
    let (end_year, end_week) = calendar::season_end(start_year, start_week, length_weeks)?;

    conn.execute(
        "INSERT INTO seasons (start_year, start_week, end_year, end_week, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![start_year, start_week, end_year, end_week, now.to_rfc3339()],
    )?;

    Ok(Season {
        id: conn.last_insert_rowid(),
        start_year,
        start_week,
        end_year,
        end_week,
        created_at: now,
    })
}

/// Resolve the current season inside an open transaction, bootstrapping the
/// first one if the table is empty. The IMMEDIATE transaction means two
/// racing bootstrap attempts serialize and the loser sees the winner's row.
pub(crate) fn current_season_tx(
    conn: &Connection,
    length_weeks: u32,
    now: DateTime<Utc>,
) -> Result<Season> {
    if let Some(season) = latest_season(conn)? {
        return Ok(season);
    }
    let season = insert_season(conn, length_weeks, now)?;
    info!(
        season_id = season.id,
        start = %season.start_label(),
        end = %season.end_label(),
        "bootstrapped first season"
    );
    Ok(season)
}

pub(crate) fn map_season_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        start_year: row.get(1)?,
        start_week: row.get(2)?,
        end_year: row.get(3)?,
        end_week: row.get(4)?,
        created_at: parse_utc(5, &row.get::<_, String>(5)?)?,
    })
}

/// Parse a stored RFC-3339 timestamp, surfacing corruption as a conversion
/// failure instead of panicking.
pub(crate) fn parse_utc(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
