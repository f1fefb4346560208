//! Consumer Binary - schema filter + idempotent trade writer
//!
//! Reads the message log as a consumer group, drops legacy order messages
//! and stores each trade exactly once.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin consumer
//! ```
//!
//! ## Environment Variables
//!
//! - TRADEFLOW_BROKER_PATH - Message log database (default: data/broker.db)
//! - TRADEFLOW_DB_PATH - Trade store database (default: data/tradeflow.db)
//! - TRADEFLOW_TOPIC - Topic to consume (default: orders)
//! - TRADEFLOW_GROUP_ID - Consumer group (default: trades-consumer-group-v2)
//! - TRADEFLOW_OFFSET_RESET - latest | earliest (default: latest)
//! - POLL_TIMEOUT_MS - Poll timeout (default: 1000)
//! - WRITE_RETRY_INITIAL_MS / WRITE_RETRY_MAX_MS - Write retry backoff (default: 500 / 30000)
//! - WRITE_RETRY_LIMIT - Give up after this many retries (default: unset, retry forever)
//! - STATS_LOG_INTERVAL_SECS - Stats logging interval (default: 10)
//! - RUST_LOG - Logging level (optional, default: info)

use tokio_util::sync::CancellationToken;
use tradeflow::{consumer_core, init_logging, install_interrupt_handler, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let config = PipelineConfig::from_env()?;

    log::info!("🚀 Starting Trade Consumer");
    config.log_summary();

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    consumer_core::run(&config, cancel).await?;
    Ok(())
}
