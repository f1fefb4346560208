use crate::trade::Trade;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt row for trade {trade_id}: {detail}")]
    CorruptRow { trade_id: String, detail: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// First time this `trade_id` was seen; the row is now committed
    Inserted,
    /// A row with this `trade_id` already existed and was left untouched
    Duplicate,
}

#[async_trait]
pub trait TradeStore: Send {
    /// Insert the trade unless a row with the same `trade_id` exists.
    ///
    /// Never updates an existing row. Returns only after the write is
    /// committed.
    async fn insert_if_absent(&mut self, trade: &Trade) -> Result<WriteOutcome, StoreError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
