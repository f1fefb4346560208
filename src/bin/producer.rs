//! Producer Binary - synthetic trade emitter
//!
//! Emits one random trade per interval onto the message log.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin producer
//! ```
//!
//! ## Environment Variables
//!
//! - TRADEFLOW_BROKER_PATH - Message log database (default: data/broker.db)
//! - TRADEFLOW_TOPIC - Topic to publish on (default: orders)
//! - EMIT_INTERVAL_MS - Delay between trades (default: 1000)
//! - MAX_IN_FLIGHT - Publisher queue capacity (default: 1000)
//! - RUST_LOG - Logging level (optional, default: info)

use tokio_util::sync::CancellationToken;
use tradeflow::{init_logging, install_interrupt_handler, producer_core, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let config = PipelineConfig::from_env()?;

    log::info!("🚀 Starting Trade Producer");
    config.log_summary();

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    producer_core::run(&config, cancel).await?;
    Ok(())
}
