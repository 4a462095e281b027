use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::Result;
use crate::geo_math::GeoPoint;
use crate::summary::SessionSummary;

/// Result of deleting a stored run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Durable storage of completed sessions
pub trait HistoryStore {
    /// Insert a new record and return its id. Never overwrites an existing record.
    fn save(&mut self, summary: &SessionSummary) -> Result<i64>;

    /// All records in insertion order
    fn list_all(&self) -> Result<Vec<SessionSummary>>;

    fn get(&self, id: i64) -> Result<Option<SessionSummary>>;

    fn delete_by_id(&mut self, id: i64) -> Result<DeleteOutcome>;
}

/// Sort records for display, most recent first
pub fn newest_first(mut runs: Vec<SessionSummary>) -> Vec<SessionSummary> {
    runs.sort_by(|a, b| b.id.cmp(&a.id));
    runs
}

const CREATE_RUNS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        distance_km TEXT NOT NULL,
        duration TEXT NOT NULL,
        pace TEXT NOT NULL,
        avg_speed_kmh REAL NOT NULL,
        path TEXT
    )
"#;

const SELECT_RUNS: &str = r#"
    SELECT id, date, start_time, end_time, distance_km, duration, pace, avg_speed_kmh, path
    FROM runs
"#;

/// SQLite-backed run history
#[derive(Debug)]
pub struct SqliteHistoryStore {
    conn: Connection,
}

impl SqliteHistoryStore {
    /// Open (or create) the history database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::debug!("opening run history at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_RUNS_TABLE, [])?;
        Ok(SqliteHistoryStore { conn })
    }

    /// Close the underlying connection, surfacing any error on the final flush
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

/// Decode a stored path. Undecodable data degrades to an empty path.
fn parse_path(id: i64, raw: Option<String>) -> Vec<GeoPoint> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<GeoPoint>>(&raw) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("run {} has malformed path data, showing it without a route: {}", id, e);
            Vec::new()
        }
    }
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<SessionSummary> {
    let id: i64 = row.get(0)?;
    Ok(SessionSummary {
        id: Some(id),
        date: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        distance_km: row.get(4)?,
        duration: row.get(5)?,
        pace_min_per_km: row.get(6)?,
        avg_speed_kmh: row.get(7)?,
        path: parse_path(id, row.get(8)?),
    })
}

impl HistoryStore for SqliteHistoryStore {
    fn save(&mut self, summary: &SessionSummary) -> Result<i64> {
        let path = serde_json::to_string(&summary.path)?;
        self.conn.execute(
            r#"
            INSERT INTO runs
            (date, start_time, end_time, distance_km, duration, pace, avg_speed_kmh, path)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                summary.date,
                summary.start_time,
                summary.end_time,
                summary.distance_km,
                summary.duration,
                summary.pace_min_per_km,
                summary.avg_speed_kmh,
                path,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        log::info!("saved run {} ({} km, {})", id, summary.distance_km, summary.duration);
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(&format!("{} ORDER BY id", SELECT_RUNS))?;
        let run_iter = stmt.query_map([], row_to_summary)?;

        let mut runs = Vec::new();
        for run in run_iter {
            runs.push(run?);
        }
        Ok(runs)
    }

    fn get(&self, id: i64) -> Result<Option<SessionSummary>> {
        let mut stmt = self.conn.prepare(&format!("{} WHERE id = ?1", SELECT_RUNS))?;
        Ok(stmt.query_row([id], row_to_summary).optional()?)
    }

    fn delete_by_id(&mut self, id: i64) -> Result<DeleteOutcome> {
        let affected = self.conn.execute("DELETE FROM runs WHERE id = ?1", [id])?;
        if affected == 0 {
            log::warn!("run {} not found for deletion", id);
            Ok(DeleteOutcome::NotFound)
        } else {
            log::info!("deleted run {}", id);
            Ok(DeleteOutcome::Deleted)
        }
    }
}
