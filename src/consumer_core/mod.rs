pub mod error_handler;
pub mod ingest_filter;
pub mod sqlite_store;
pub mod store_backend;

mod lib;

pub use error_handler::{ExponentialBackoff, RetryPolicy};
pub use ingest_filter::{filter_message, Rejection};
pub use lib::{consume_loop, process_record, run, run_with, ConsumerError, ConsumerSettings, ConsumerStats, MessageOutcome};
pub use sqlite_store::SqliteTradeStore;
pub use store_backend::{StoreError, TradeStore, WriteOutcome};
