//! SQLite-backed message log
//!
//! Positions come from an AUTOINCREMENT key, so they are strictly increasing
//! per database and never reused. Each consumer group stores the next
//! position it wants to read in `consumer_offsets`.

use super::{BrokerError, BrokerRecord, LogConsumer, LogProducer, OffsetReset};
use crate::sqlite_pragma::{apply_optimized_pragmas, ensure_parent_dir};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn open_log(db_path: &Path) -> Result<Connection, BrokerError> {
    ensure_parent_dir(db_path)?;
    let conn = Connection::open(db_path)?;
    apply_optimized_pragmas(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS log_records (
            position INTEGER PRIMARY KEY AUTOINCREMENT,
            topic TEXT NOT NULL,
            payload BLOB NOT NULL,
            produced_at INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_log_topic_position ON log_records(topic, position)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS consumer_offsets (
            group_id TEXT NOT NULL,
            topic TEXT NOT NULL,
            next_position INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (group_id, topic)
        )",
        [],
    )?;

    Ok(conn)
}

/// Producer handle on the log
pub struct SqliteLog {
    conn: Connection,
}

impl SqliteLog {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let conn = open_log(db_path.as_ref())?;
        log::info!("✅ Message log ready at {}", db_path.as_ref().display());
        Ok(Self { conn })
    }

    /// Number of records ever appended to `topic`
    pub fn record_count(&self, topic: &str) -> Result<i64, BrokerError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM log_records WHERE topic = ?1",
            params![topic],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn append(&self, topic: &str, payload: &[u8]) -> Result<i64, BrokerError> {
        self.conn.execute(
            "INSERT INTO log_records (topic, payload, produced_at) VALUES (?1, ?2, ?3)",
            params![topic, payload, Utc::now().timestamp_millis()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

#[async_trait]
impl LogProducer for SqliteLog {
    async fn send(&mut self, topic: &str, payload: &[u8]) -> Result<i64, BrokerError> {
        self.append(topic, payload)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite log"
    }
}

/// Consumer-group handle on one topic of the log
pub struct SqliteLogConsumer {
    conn: Connection,
    group_id: String,
    topic: String,
    next_position: i64,
    poll_interval: Duration,
}

impl SqliteLogConsumer {
    /// Join `group_id` on `topic`.
    ///
    /// Resumes from the group's committed position; a group that never
    /// committed starts according to `reset`.
    pub fn subscribe(
        db_path: impl AsRef<Path>,
        group_id: &str,
        topic: &str,
        reset: OffsetReset,
    ) -> Result<Self, BrokerError> {
        let conn = open_log(db_path.as_ref())?;

        let committed: Option<i64> = conn
            .query_row(
                "SELECT next_position FROM consumer_offsets WHERE group_id = ?1 AND topic = ?2",
                params![group_id, topic],
                |row| row.get(0),
            )
            .optional()?;

        let next_position = match committed {
            Some(position) => {
                log::info!("📥 Group {} resuming {} at position {}", group_id, topic, position);
                position
            }
            None => {
                let start = match reset {
                    OffsetReset::Earliest => 0,
                    OffsetReset::Latest => conn.query_row(
                        "SELECT COALESCE(MAX(position), 0) + 1 FROM log_records WHERE topic = ?1",
                        params![topic],
                        |row| row.get(0),
                    )?,
                };
                log::info!(
                    "📥 Group {} has no committed position on {}, starting at {} ({})",
                    group_id,
                    topic,
                    start,
                    reset.as_str()
                );
                start
            }
        };

        Ok(Self {
            conn,
            group_id: group_id.to_string(),
            topic: topic.to_string(),
            next_position,
            poll_interval: Duration::from_millis(100),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Position stored for this group, if it ever committed
    pub fn committed_position(&self) -> Result<Option<i64>, BrokerError> {
        let committed = self
            .conn
            .query_row(
                "SELECT next_position FROM consumer_offsets WHERE group_id = ?1 AND topic = ?2",
                params![self.group_id, self.topic],
                |row| row.get(0),
            )
            .optional()?;
        Ok(committed)
    }

    fn fetch_next(&self) -> Result<Option<BrokerRecord>, BrokerError> {
        let record = self
            .conn
            .query_row(
                "SELECT position, payload FROM log_records
                 WHERE topic = ?1 AND position >= ?2
                 ORDER BY position ASC
                 LIMIT 1",
                params![self.topic, self.next_position],
                |row| {
                    Ok(BrokerRecord {
                        topic: self.topic.clone(),
                        position: row.get(0)?,
                        payload: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

#[async_trait]
impl LogConsumer for SqliteLogConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(record) = self.fetch_next()? {
                self.next_position = record.position + 1;
                return Ok(Some(record));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn commit(&mut self, record: &BrokerRecord) -> Result<(), BrokerError> {
        self.conn.execute(
            "INSERT INTO consumer_offsets (group_id, topic, next_position, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id, topic) DO UPDATE SET
                next_position = excluded.next_position,
                updated_at = excluded.updated_at",
            params![
                self.group_id,
                record.topic,
                record.position + 1,
                Utc::now().timestamp_millis()
            ],
        )?;
        log::trace!("Committed {}@{} for {}", record.topic, record.position, self.group_id);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite log"
    }
}
