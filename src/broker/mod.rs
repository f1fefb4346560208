//! Message log boundary
//!
//! The pipeline only needs an ordered, durable, at-least-once log with
//! per-group positions. [`LogProducer`] and [`LogConsumer`] are the contract;
//! [`SqliteLog`] is the adapter the binaries run against.
//!
//! ```text
//! Publisher ──send(topic, payload)──▶ log_records
//!                                         │
//! consumer loop ◀──poll()── LogConsumer ──┘
//!        │
//!        └──commit(record)──▶ consumer_offsets (group_id, topic)
//! ```

pub mod sqlite_log;

use async_trait::async_trait;
use std::time::Duration;

pub use sqlite_log::{SqliteLog, SqliteLogConsumer};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Broker IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

/// Where a group with no committed position starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Only messages produced after the group first subscribes
    Latest,
    /// Everything still in the log
    Earliest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Latest => "latest",
            OffsetReset::Earliest => "earliest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Some(OffsetReset::Latest),
            "earliest" => Some(OffsetReset::Earliest),
            _ => None,
        }
    }
}

/// One message as delivered to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub position: i64,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait LogProducer: Send {
    /// Append a payload to a topic, returning the assigned position
    async fn send(&mut self, topic: &str, payload: &[u8]) -> Result<i64, BrokerError>;

    /// Name used in log lines
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
pub trait LogConsumer: Send {
    /// Next record after the group's position, or `None` if nothing arrived
    /// before `timeout` elapsed.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerRecord>, BrokerError>;

    /// Durably mark `record` as processed for this group
    async fn commit(&mut self, record: &BrokerRecord) -> Result<(), BrokerError>;

    fn backend_type(&self) -> &'static str;
}
