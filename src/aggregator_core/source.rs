use crate::consumer_core::store_backend::StoreError;
use crate::trade::Trade;
use async_trait::async_trait;

/// Where the refresher reads its window from
#[async_trait]
pub trait WindowSource: Send {
    /// Most recent `limit` trades, newest first
    async fn read_window(&mut self, limit: usize) -> Result<Vec<Trade>, StoreError>;
}
