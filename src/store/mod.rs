//! Append-only snapshot persistence
//!
//! One SQLite table per snapshot kind, keyed by arrival order through an
//! autoincrement surrogate key. Rows are facts: they are inserted once and
//! never updated or deleted. Each `save_*` call commits its batch in a
//! single transaction, so a batch is either fully visible or not at all.
//!
//! The store owns the on-disk representation exclusively. It is shared
//! across the polling and streaming loops behind an `Arc`; the internal
//! mutex serializes conflicting writes.

use crate::snapshot::{
    MarketSnapshot, OrderBookSnapshot, OutcomeSnapshot, PriceChangeEvent, ResolutionSnapshot,
    TradeSnapshot,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persistence errors
///
/// `NotInitialized` is a precondition violation, kept distinct from
/// storage I/O failures so callers can tell the two apart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write or query was attempted before `init()`
    #[error("store not initialized, call init() first")]
    NotInitialized,
    /// An underlying SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// The database file's parent directory could not be created
    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS market_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    title TEXT,
    category TEXT,
    yes_price REAL,
    no_price REAL,
    parity_gap REAL,
    best_bid REAL,
    best_ask REAL,
    spread REAL,
    volume_24h REAL,
    liquidity REAL,
    end_time TEXT,
    active BOOLEAN
);

CREATE TABLE IF NOT EXISTS outcome_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    outcome TEXT,
    price REAL,
    token_id TEXT
);

CREATE TABLE IF NOT EXISTS orderbook_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    token_id TEXT NOT NULL,
    side TEXT,
    level INTEGER,
    price REAL,
    size REAL
);

CREATE TABLE IF NOT EXISTS trade_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    token_id TEXT NOT NULL,
    price REAL,
    size REAL,
    side TEXT
);

CREATE TABLE IF NOT EXISTS resolution_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    resolved BOOLEAN,
    resolution_outcome TEXT,
    resolution_source TEXT
);

CREATE TABLE IF NOT EXISTS price_change_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    market_id TEXT NOT NULL,
    token_id TEXT NOT NULL,
    price REAL,
    size REAL,
    side TEXT,
    best_bid REAL,
    best_ask REAL
);

CREATE INDEX IF NOT EXISTS idx_market_snap_time ON market_snapshots(timestamp);
CREATE INDEX IF NOT EXISTS idx_market_snap_id ON market_snapshots(market_id);
CREATE INDEX IF NOT EXISTS idx_market_snap_gap ON market_snapshots(parity_gap);
CREATE INDEX IF NOT EXISTS idx_outcome_snap_time ON outcome_snapshots(timestamp);
CREATE INDEX IF NOT EXISTS idx_outcome_snap_id ON outcome_snapshots(market_id);
CREATE INDEX IF NOT EXISTS idx_book_snap_time ON orderbook_snapshots(timestamp);
CREATE INDEX IF NOT EXISTS idx_book_snap_id ON orderbook_snapshots(market_id);
CREATE INDEX IF NOT EXISTS idx_trade_snap_time ON trade_snapshots(timestamp);
CREATE INDEX IF NOT EXISTS idx_trade_snap_id ON trade_snapshots(market_id);
CREATE INDEX IF NOT EXISTS idx_resolution_snap_time ON resolution_snapshots(timestamp);
CREATE INDEX IF NOT EXISTS idx_resolution_snap_id ON resolution_snapshots(market_id);
CREATE INDEX IF NOT EXISTS idx_price_change_time ON price_change_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_price_change_id ON price_change_events(market_id);
CREATE INDEX IF NOT EXISTS idx_price_change_token ON price_change_events(token_id);
"#;

/// Filter for querying market snapshots
///
/// Timestamp bounds are inclusive on both ends; results come back most
/// recent first, capped at `limit`.
#[derive(Debug, Clone)]
pub struct SnapshotQuery {
    pub market_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for SnapshotQuery {
    fn default() -> Self {
        Self {
            market_id: None,
            start: None,
            end: None,
            limit: 1000,
        }
    }
}

/// SQLite-backed snapshot store
pub struct SnapshotStore {
    db_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SnapshotStore {
    /// Create a handle for the given database path without touching disk
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Open the database, creating parent directories and the schema
    ///
    /// Writes attempted before this call fail with
    /// [`StoreError::NotInitialized`].
    pub fn init(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(SCHEMA)?;

        *self.conn.lock() = Some(conn);
        tracing::info!(path = %self.db_path.display(), "Snapshot store initialized");
        Ok(())
    }

    /// Open an in-memory store, already initialized (for tests)
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Close the database connection
    pub fn close(&self) {
        *self.conn.lock() = None;
    }

    /// Path the store writes to
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Persist a batch of market snapshots atomically
    pub fn save_market_snapshots(
        &self,
        snapshots: &[MarketSnapshot],
    ) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO market_snapshots
                 (timestamp, market_id, title, category, yes_price, no_price,
                  parity_gap, best_bid, best_ask, spread, volume_24h, liquidity,
                  end_time, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;
            for snapshot in snapshots {
                stmt.execute(params![
                    timestamp_text(&snapshot.timestamp),
                    snapshot.market_id,
                    snapshot.title,
                    snapshot.category,
                    real(snapshot.yes_price),
                    real(snapshot.no_price),
                    real(snapshot.parity_gap),
                    opt_real(snapshot.best_bid),
                    opt_real(snapshot.best_ask),
                    opt_real(snapshot.spread),
                    opt_real(snapshot.volume_24h),
                    opt_real(snapshot.liquidity),
                    snapshot.end_time,
                    snapshot.active,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = snapshots.len(), "Saved market snapshots");
        Ok(snapshots.len())
    }

    /// Persist a batch of outcome snapshots atomically
    pub fn save_outcome_snapshots(
        &self,
        snapshots: &[OutcomeSnapshot],
    ) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO outcome_snapshots
                 (timestamp, market_id, outcome, price, token_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for snapshot in snapshots {
                stmt.execute(params![
                    timestamp_text(&snapshot.timestamp),
                    snapshot.market_id,
                    snapshot.outcome,
                    real(snapshot.price),
                    snapshot.token_id,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = snapshots.len(), "Saved outcome snapshots");
        Ok(snapshots.len())
    }

    /// Persist a batch of order book snapshots atomically
    pub fn save_orderbook_snapshots(
        &self,
        snapshots: &[OrderBookSnapshot],
    ) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO orderbook_snapshots
                 (timestamp, market_id, token_id, side, level, price, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for snapshot in snapshots {
                stmt.execute(params![
                    timestamp_text(&snapshot.timestamp),
                    snapshot.market_id,
                    snapshot.token_id,
                    snapshot.side.as_str(),
                    snapshot.level as i64,
                    real(snapshot.price),
                    real(snapshot.size),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = snapshots.len(), "Saved order book snapshots");
        Ok(snapshots.len())
    }

    /// Persist a batch of trade snapshots atomically
    pub fn save_trade_snapshots(&self, snapshots: &[TradeSnapshot]) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO trade_snapshots
                 (timestamp, market_id, token_id, price, size, side)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for snapshot in snapshots {
                stmt.execute(params![
                    timestamp_text(&snapshot.timestamp),
                    snapshot.market_id,
                    snapshot.token_id,
                    real(snapshot.price),
                    real(snapshot.size),
                    snapshot.side,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = snapshots.len(), "Saved trade snapshots");
        Ok(snapshots.len())
    }

    /// Persist a batch of resolution snapshots atomically
    pub fn save_resolution_snapshots(
        &self,
        snapshots: &[ResolutionSnapshot],
    ) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO resolution_snapshots
                 (timestamp, market_id, resolved, resolution_outcome, resolution_source)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for snapshot in snapshots {
                stmt.execute(params![
                    timestamp_text(&snapshot.timestamp),
                    snapshot.market_id,
                    snapshot.resolved,
                    snapshot.resolution_outcome,
                    snapshot.resolution_source,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = snapshots.len(), "Saved resolution snapshots");
        Ok(snapshots.len())
    }

    /// Persist a batch of price change events atomically
    pub fn save_price_change_events(
        &self,
        events: &[PriceChangeEvent],
    ) -> Result<usize, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO price_change_events
                 (timestamp, market_id, token_id, price, size, side, best_bid, best_ask)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for event in events {
                stmt.execute(params![
                    timestamp_text(&event.timestamp),
                    event.market_id,
                    event.token_id,
                    real(event.price),
                    real(event.size),
                    event.side,
                    opt_real(event.best_bid),
                    opt_real(event.best_ask),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = events.len(), "Saved price change events");
        Ok(events.len())
    }

    /// Query stored market snapshots, most recent first
    pub fn query_market_snapshots(
        &self,
        query: &SnapshotQuery,
    ) -> Result<Vec<MarketSnapshot>, StoreError> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let mut sql = String::from(
            "SELECT timestamp, market_id, title, category, yes_price, no_price,
                    parity_gap, best_bid, best_ask, spread, volume_24h, liquidity,
                    end_time, active
             FROM market_snapshots WHERE 1=1",
        );
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(market_id) = &query.market_id {
            sql.push_str(" AND market_id = ?");
            values.push(Box::new(market_id.clone()));
        }
        if let Some(start) = &query.start {
            sql.push_str(" AND timestamp >= ?");
            values.push(Box::new(timestamp_text(start)));
        }
        if let Some(end) = &query.end {
            sql.push_str(" AND timestamp <= ?");
            values.push(Box::new(timestamp_text(end)));
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ?");
        values.push(Box::new(query.limit as i64));

        let params: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|v| v.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let snapshots = stmt
            .query_map(&params[..], |row| {
                let ts: String = row.get(0)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;

                Ok(MarketSnapshot {
                    timestamp,
                    market_id: row.get(1)?,
                    title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    category: row.get(3)?,
                    yes_price: from_real(row.get(4)?),
                    no_price: from_real(row.get(5)?),
                    parity_gap: from_real(row.get(6)?),
                    best_bid: opt_from_real(row.get(7)?),
                    best_ask: opt_from_real(row.get(8)?),
                    spread: opt_from_real(row.get(9)?),
                    volume_24h: opt_from_real(row.get(10)?),
                    liquidity: opt_from_real(row.get(11)?),
                    end_time: row.get(12)?,
                    active: row.get(13)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// Row counts per table, in schema order
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, StoreError> {
        const TABLES: [&str; 6] = [
            "market_snapshots",
            "outcome_snapshots",
            "orderbook_snapshots",
            "trade_snapshots",
            "resolution_snapshots",
            "price_change_events",
        ];

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

/// Render a timestamp in the fixed-width RFC 3339 form used for storage,
/// so lexicographic comparison matches chronological order
fn timestamp_text(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn opt_real(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|v| v.to_f64())
}

fn from_real(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn opt_from_real(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}
