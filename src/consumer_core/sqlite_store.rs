use crate::aggregator_core::source::WindowSource;
use crate::consumer_core::store_backend::{StoreError, TradeStore, WriteOutcome};
use crate::sqlite_pragma::{apply_optimized_pragmas, ensure_parent_dir};
use crate::trade::{Side, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// `trades` table keyed by `trade_id`
pub struct SqliteTradeStore {
    conn: Connection,
}

impl SqliteTradeStore {
    /// Open (and create if needed) the store for writing
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Self::open_with_schema(db_path.as_ref())?;
        log::info!("✅ Trade store initialized at {} (WAL mode)", db_path.as_ref().display());
        Ok(Self { conn })
    }

    /// Open a connection that refuses writes, for the dashboard
    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Self::open_with_schema(db_path.as_ref())?;
        // Must come after schema creation and PRAGMAs
        conn.execute("PRAGMA query_only = ON", [])?;
        log::info!("📥 Trade store opened read-only at {}", db_path.as_ref().display());
        Ok(Self { conn })
    }

    fn open_with_schema(db_path: &Path) -> Result<Connection, StoreError> {
        ensure_parent_dir(db_path)?;
        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                price REAL NOT NULL,
                volume INTEGER NOT NULL,
                side TEXT NOT NULL CHECK (side IN ('buy', 'sell')),
                timestamp TEXT NOT NULL,
                ingested_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp DESC)",
            [],
        )?;

        Ok(conn)
    }

    fn insert_row(&mut self, trade: &Trade) -> Result<WriteOutcome, StoreError> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "INSERT INTO trades (trade_id, ticker, price, volume, side, timestamp, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(trade_id) DO NOTHING",
            params![
                trade.trade_id,
                trade.ticker,
                trade.price,
                trade.volume,
                trade.side.as_str(),
                trade.timestamp_key(),
                Utc::now().timestamp_millis(),
            ],
        )?;
        tx.commit()?;

        Ok(if changed == 0 {
            WriteOutcome::Duplicate
        } else {
            WriteOutcome::Inserted
        })
    }

    /// Most recent `limit` rows, newest first
    pub fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_id, ticker, price, volume, side, timestamp
             FROM trades
             ORDER BY timestamp DESC, trade_id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(RawRow {
                trade_id: row.get(0)?,
                ticker: row.get(1)?,
                price: row.get(2)?,
                volume: row.get(3)?,
                side: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?;

        let mut trades = Vec::with_capacity(limit.min(1024));
        for row in rows {
            trades.push(row?.into_trade()?);
        }
        Ok(trades)
    }

    pub fn get(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT trade_id, ticker, price, volume, side, timestamp FROM trades WHERE trade_id = ?1",
                params![trade_id],
                |row| {
                    Ok(RawRow {
                        trade_id: row.get(0)?,
                        ticker: row.get(1)?,
                        price: row.get(2)?,
                        volume: row.get(3)?,
                        side: row.get(4)?,
                        timestamp: row.get(5)?,
                    })
                },
            )
            .optional()?;
        raw.map(RawRow::into_trade).transpose()
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))?;
        Ok(count)
    }
}

struct RawRow {
    trade_id: String,
    ticker: String,
    price: f64,
    volume: u32,
    side: String,
    timestamp: String,
}

impl RawRow {
    fn into_trade(self) -> Result<Trade, StoreError> {
        let side = Side::parse(&self.side).ok_or_else(|| StoreError::CorruptRow {
            trade_id: self.trade_id.clone(),
            detail: format!("unknown side {:?}", self.side),
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StoreError::CorruptRow {
                trade_id: self.trade_id.clone(),
                detail: format!("bad timestamp {:?}: {}", self.timestamp, e),
            })?
            .with_timezone(&Utc);

        Ok(Trade {
            trade_id: self.trade_id,
            ticker: self.ticker,
            price: self.price,
            volume: self.volume,
            side,
            timestamp,
        })
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn insert_if_absent(&mut self, trade: &Trade) -> Result<WriteOutcome, StoreError> {
        self.insert_row(trade)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[async_trait]
impl WindowSource for SqliteTradeStore {
    async fn read_window(&mut self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        self.recent_trades(limit)
    }
}
