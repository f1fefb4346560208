//! Pipeline Runtime - producer, consumer and headless dashboard in one process
//!
//! Spawns the three loops on one runtime sharing a single cancellation
//! token. The dashboard writes JSON snapshots instead of drawing.
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime
//!
//! Environment variables: same as the producer, consumer and dashboard
//! binaries.

use dotenv::dotenv;
use log::{error, info};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tradeflow::aggregator_core::{run_refresher, JsonSnapshotFile, Refresher};
use tradeflow::broker::SqliteLogConsumer;
use tradeflow::consumer_core::{self, ConsumerSettings, SqliteTradeStore};
use tradeflow::runtime::supervise;
use tradeflow::{init_logging, install_interrupt_handler, producer_core, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    info!("🚀 Pipeline Runtime");
    let config = PipelineConfig::from_env()?;
    config.log_summary();

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    // Subscribe before the producer starts so a `latest` group sees the first trade
    let subscription = SqliteLogConsumer::subscribe(
        &config.broker_path,
        &config.group_id,
        &config.topic,
        config.offset_reset,
    )?;
    let store = SqliteTradeStore::new(&config.db_path)?;
    let mut tasks = JoinSet::new();
    let consumer_settings = ConsumerSettings::from(&config);
    let consumer_cancel = cancel.clone();
    tasks.spawn(async move {
        let result = consumer_core::run_with(subscription, store, consumer_settings, consumer_cancel).await;
        (
            "consumer",
            result
                .map(|stats| format!("{} inserted, {} rejected", stats.inserted, stats.rejected))
                .map_err(|e| e.to_string()),
        )
    });

    let producer_config = config.clone();
    let producer_cancel = cancel.clone();
    tasks.spawn(async move {
        let result = producer_core::run(&producer_config, producer_cancel).await;
        (
            "producer",
            result
                .map(|summary| format!("{} emitted", summary.emitted))
                .map_err(|e| e.to_string()),
        )
    });

    let refresher = Refresher::new(SqliteTradeStore::open_read_only(&config.db_path)?, config.window_size)
        .with_surface(Box::new(JsonSnapshotFile::new(&config.snapshot_path)?));
    let refresher_cancel = cancel.clone();
    let refresh_every = config.refresh_interval;
    tasks.spawn(async move {
        run_refresher(refresher, refresh_every, refresher_cancel).await;
        ("refresher", Ok("stopped".to_string()))
    });

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let failed = supervise(tasks, &cancel).await;

    info!("👋 Pipeline runtime shutdown complete");
    if !failed.is_empty() {
        error!("❌ Failed tasks: {}", failed.join(", "));
        return Err("pipeline stopped with errors".into());
    }
    Ok(())
}
