use crate::broker::{BrokerError, SqliteLog};
use crate::config::PipelineConfig;
use crate::producer_core::{
    generator::TradeGenerator,
    publisher::{log_delivery_report, DeliveryReport, Publisher},
};
use crate::trade::Trade;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Delivery totals for one producer run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    pub emitted: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl EmitSummary {
    fn record(&mut self, report: &DeliveryReport) {
        if report.is_delivered() {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Run the generator → publisher loop until `cancel` fires.
pub async fn run(config: &PipelineConfig, cancel: CancellationToken) -> Result<EmitSummary, BrokerError> {
    let log = SqliteLog::open(&config.broker_path)?;
    let publisher = Publisher::spawn(Box::new(log), config.topic.clone(), config.max_in_flight);

    log::info!("🚀 Producer emitting every {}ms", config.emit_interval.as_millis());
    let summary = emit_loop(TradeGenerator::new(), publisher, config.emit_interval, cancel).await;
    log::info!(
        "🔴 Producer stopped: {} emitted, {} delivered, {} failed",
        summary.emitted,
        summary.delivered,
        summary.failed
    );
    Ok(summary)
}

/// Emit one trade per tick, draining delivery reports as they complete.
///
/// On cancellation the publisher is flushed so nothing queued is lost.
pub async fn emit_loop<I>(
    mut trades: I,
    mut publisher: Publisher,
    emit_interval: Duration,
    cancel: CancellationToken,
) -> EmitSummary
where
    I: Iterator<Item = Trade>,
{
    let mut summary = EmitSummary::default();
    let mut ticker = interval(emit_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("⚠️  Producer received shutdown signal");
                break;
            }
            _ = ticker.tick() => {}
        }

        let Some(trade) = trades.next() else {
            break;
        };

        match publisher.publish(&trade).await {
            Ok(()) => {
                summary.emitted += 1;
                log::info!(
                    "📤 Sent trade: {} {} {} x{} @ {:.2}",
                    trade.trade_id,
                    trade.side,
                    trade.ticker,
                    trade.volume,
                    trade.price
                );
            }
            Err(e) => {
                log::error!("❌ Publisher unavailable, stopping emission: {}", e);
                break;
            }
        }

        publisher.poll_reports(|report| {
            log_delivery_report(report);
            summary.record(report);
        });
    }

    for report in publisher.flush().await {
        log_delivery_report(&report);
        summary.record(&report);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{LogConsumer, OffsetReset, SqliteLogConsumer};
    use crate::producer_core::generator::TradeGenerator;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_emit_loop_publishes_then_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.db");
        let log = SqliteLog::open(&path).unwrap();
        let publisher = Publisher::spawn(Box::new(log), "orders", 8);

        let trades: Vec<Trade> = TradeGenerator::seeded(5).take(3).collect();
        let cancel = CancellationToken::new();
        let summary = emit_loop(trades.clone().into_iter(), publisher, Duration::from_millis(1), cancel).await;

        assert_eq!(summary, EmitSummary { emitted: 3, delivered: 3, failed: 0 });

        let mut consumer = SqliteLogConsumer::subscribe(&path, "check", "orders", OffsetReset::Earliest).unwrap();
        for expected in &trades {
            let record = consumer.poll(Duration::from_millis(50)).await.unwrap().unwrap();
            let decoded: Trade = serde_json::from_slice(&record.payload).unwrap();
            assert_eq!(&decoded, expected);
        }
    }

    #[tokio::test]
    async fn test_cancelled_loop_emits_nothing() {
        let dir = tempdir().unwrap();
        let log = SqliteLog::open(dir.path().join("log.db")).unwrap();
        let publisher = Publisher::spawn(Box::new(log), "orders", 8);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = emit_loop(TradeGenerator::seeded(1), publisher, Duration::from_millis(1), cancel).await;

        assert_eq!(summary.emitted, 0);
    }
}
