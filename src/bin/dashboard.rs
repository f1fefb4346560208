//! Dashboard Binary - live view over the trade store
//!
//! Recomputes the aggregate snapshot from the most recent trades on a fixed
//! interval and shows it in the terminal.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin dashboard
//! cargo run --release --bin dashboard -- --headless   # JSON snapshots only
//! ```
//!
//! ## Environment Variables
//!
//! - TRADEFLOW_DB_PATH - Trade store database (default: data/tradeflow.db)
//! - REFRESH_INTERVAL_MS - Refresh interval (default: 2000)
//! - WINDOW_SIZE - Number of most recent trades aggregated (default: 200)
//! - SNAPSHOT_PATH - JSON snapshot file in headless mode (default: data/snapshot.json)
//! - RUST_LOG - Logging level (optional, default: info)

use std::env;
use tokio_util::sync::CancellationToken;
use tradeflow::aggregator_core::{run_refresher, JsonSnapshotFile, Refresher, SnapshotBoard};
use tradeflow::consumer_core::SqliteTradeStore;
use tradeflow::{init_logging, install_interrupt_handler, ui, PipelineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayMode {
    Terminal,
    Headless,
}

fn parse_mode_from_args() -> DisplayMode {
    let args: Vec<String> = env::args().collect();
    if args.contains(&"--headless".to_string()) {
        return DisplayMode::Headless;
    }
    DisplayMode::Terminal
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let config = PipelineConfig::from_env()?;
    let mode = parse_mode_from_args();

    log::info!("🚀 Starting Trades Dashboard ({:?})", mode);
    config.log_summary();

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    let store = SqliteTradeStore::open_read_only(&config.db_path)?;

    match mode {
        DisplayMode::Headless => {
            let refresher = Refresher::new(store, config.window_size)
                .with_surface(Box::new(JsonSnapshotFile::new(&config.snapshot_path)?));
            run_refresher(refresher, config.refresh_interval, cancel).await;
        }
        DisplayMode::Terminal => {
            let board = SnapshotBoard::new();
            let refresher = Refresher::new(store, config.window_size).with_surface(Box::new(board.clone()));
            let refresh_task = tokio::spawn(run_refresher(refresher, config.refresh_interval, cancel.clone()));

            let ui_result = ui::run_ui(board, config.window_size, cancel.clone()).await;
            cancel.cancel();
            refresh_task.await?;
            ui_result?;
        }
    }

    log::info!("🔴 Dashboard stopped");
    Ok(())
}
