//! End-to-end tests over real SQLite files: message log → consumer → trade
//! store → refresher → display surfaces.

#[cfg(test)]
mod pipeline_integration_tests {
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use tradeflow::aggregator_core::{DashboardView, JsonSnapshotFile, Refresher, SnapshotBoard};
    use tradeflow::broker::{
        BrokerError, BrokerRecord, LogConsumer, LogProducer, OffsetReset, SqliteLog, SqliteLogConsumer,
    };
    use tradeflow::consumer_core::{
        consume_loop, ConsumerSettings, ConsumerStats, RetryPolicy, SqliteTradeStore,
    };
    use tradeflow::producer_core::{emit_loop, Publisher, TradeGenerator};

    const TOPIC: &str = "orders";
    const GROUP: &str = "trades-consumer-group-v2";

    /// Stops the loop once the log has nothing more to deliver
    struct DrainThenStop {
        inner: SqliteLogConsumer,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl LogConsumer for DrainThenStop {
        async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
            let polled = self.inner.poll(timeout).await;
            if matches!(polled, Ok(None)) {
                self.cancel.cancel();
            }
            polled
        }

        async fn commit(&mut self, record: &BrokerRecord) -> Result<(), BrokerError> {
            self.inner.commit(record).await
        }

        fn backend_type(&self) -> &'static str {
            "drain"
        }
    }

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            poll_timeout: Duration::from_millis(50),
            write_retry: RetryPolicy::default(),
            stats_log_interval: Duration::from_secs(60),
        }
    }

    async fn publish_raw(broker: &Path, payloads: &[&str]) -> Vec<i64> {
        let mut log = SqliteLog::open(broker).unwrap();
        let mut positions = Vec::new();
        for payload in payloads {
            positions.push(log.send(TOPIC, payload.as_bytes()).await.unwrap());
        }
        positions
    }

    /// Consume everything currently in the log, returning stats and the
    /// group's committed position.
    async fn drain(broker: &Path, db: &Path) -> (ConsumerStats, Option<i64>) {
        let cancel = CancellationToken::new();
        let inner = SqliteLogConsumer::subscribe(broker, GROUP, TOPIC, OffsetReset::Earliest)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        let mut consumer = DrainThenStop {
            inner,
            cancel: cancel.clone(),
        };
        let mut store = SqliteTradeStore::new(db).unwrap();

        let stats = consume_loop(&mut consumer, &mut store, &settings(), &cancel).await.unwrap();
        let committed = consumer.inner.committed_position().unwrap();
        (stats, committed)
    }

    const T1: &str = r#"{"trade_id":"T1","ticker":"AAPL","price":100.00,"volume":10,"side":"buy","timestamp":"2024-01-01T00:00:00Z"}"#;

    #[tokio::test]
    async fn test_duplicate_publish_stores_one_row() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        publish_raw(&broker, &[T1, T1]).await;
        let (stats, _) = drain(&broker, &db).await;

        assert_eq!(stats.received, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 1);

        let store = SqliteTradeStore::open_read_only(&db).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let stored = store.get("T1").unwrap().unwrap();
        assert_eq!(stored.ticker, "AAPL");
        assert_eq!(stored.volume, 10);
    }

    #[tokio::test]
    async fn test_legacy_message_is_dropped_and_position_advances() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        let positions = publish_raw(&broker, &[r#"{"order_id":"O1","qty":5}"#]).await;
        let (stats, committed) = drain(&broker, &db).await;

        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.inserted, 0);
        assert_eq!(committed, Some(positions[0] + 1));
        assert_eq!(SqliteTradeStore::open_read_only(&db).unwrap().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mixed_generations_only_trades_stored() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        publish_raw(
            &broker,
            &[
                r#"{"order_id":"O1","qty":5}"#,
                T1,
                "not json at all",
                r#"{"trade_id":"T2","ticker":"MSFT","price":5.0,"volume":5,"side":"sell","timestamp":"2024-01-01T00:00:01Z"}"#,
            ],
        )
        .await;
        let (stats, _) = drain(&broker, &db).await;

        assert_eq!((stats.inserted, stats.rejected), (2, 2));
        assert_eq!(SqliteTradeStore::open_read_only(&db).unwrap().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zone_less_timestamp_is_stored_as_utc() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        publish_raw(
            &broker,
            &[r#"{"trade_id":"Z1","ticker":"GOOGL","price":123.45,"volume":7,"side":"buy","timestamp":"2003-05-12T14:22:11"}"#],
        )
        .await;
        let (stats, _) = drain(&broker, &db).await;

        assert_eq!((stats.inserted, stats.rejected), (1, 0));
        let stored = SqliteTradeStore::open_read_only(&db).unwrap().get("Z1").unwrap().unwrap();
        assert_eq!(stored.timestamp.to_rfc3339(), "2003-05-12T14:22:11+00:00");
    }

    #[tokio::test]
    async fn test_restart_resumes_after_committed_position() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        publish_raw(&broker, &[T1]).await;
        let (first, _) = drain(&broker, &db).await;
        assert_eq!(first.received, 1);

        // Same group again: nothing new to deliver
        let (second, _) = drain(&broker, &db).await;
        assert_eq!(second.received, 0);
        assert_eq!(SqliteTradeStore::open_read_only(&db).unwrap().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_aggregates_volume_and_top_ticker() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        publish_raw(
            &broker,
            &[
                r#"{"trade_id":"A1","ticker":"AAPL","price":100.0,"volume":10,"side":"buy","timestamp":"2024-01-01T00:00:00Z"}"#,
                r#"{"trade_id":"A2","ticker":"AAPL","price":110.0,"volume":20,"side":"sell","timestamp":"2024-01-01T00:00:01Z"}"#,
                r#"{"trade_id":"M1","ticker":"MSFT","price":300.0,"volume":5,"side":"buy","timestamp":"2024-01-01T00:00:02Z"}"#,
            ],
        )
        .await;
        drain(&broker, &db).await;

        let board = SnapshotBoard::new();
        let mut refresher = Refresher::new(SqliteTradeStore::open_read_only(&db).unwrap(), 200)
            .with_surface(Box::new(board.clone()));
        refresher.refresh_once().await.unwrap();

        let state = board.current().await;
        let snapshot = state.view.snapshot().unwrap();
        assert_eq!(snapshot.trade_count, 3);
        assert_eq!(snapshot.total_volume, 35);
        assert_eq!(snapshot.top_ticker, "AAPL");
        assert!((snapshot.mean_price - 170.0).abs() < 1e-9);
        assert_eq!(snapshot.recent_trades[0].trade_id, "M1");
    }

    #[tokio::test]
    async fn test_empty_store_publishes_empty_state() {
        let dir = tempdir().unwrap();
        let snapshot_path = dir.path().join("snapshot.json");

        let board = SnapshotBoard::new();
        let mut refresher = Refresher::new(SqliteTradeStore::open_read_only(dir.path().join("trades.db")).unwrap(), 200)
            .with_surface(Box::new(board.clone()))
            .with_surface(Box::new(JsonSnapshotFile::new(&snapshot_path).unwrap()));

        assert_eq!(refresher.refresh_once().await.unwrap(), DashboardView::NoData);
        assert_eq!(board.current().await.view, DashboardView::NoData);

        let written: DashboardView = serde_json::from_slice(&std::fs::read(&snapshot_path).unwrap()).unwrap();
        assert_eq!(written, DashboardView::NoData);
    }

    #[tokio::test]
    async fn test_generated_trades_flow_end_to_end() {
        let dir = tempdir().unwrap();
        let (broker, db) = (dir.path().join("broker.db"), dir.path().join("trades.db"));

        let publisher = Publisher::spawn(Box::new(SqliteLog::open(&broker).unwrap()), TOPIC.to_string(), 16);
        let summary = emit_loop(
            TradeGenerator::seeded(7).take(5),
            publisher,
            Duration::from_millis(1),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(summary.delivered, 5);

        let (stats, _) = drain(&broker, &db).await;
        assert_eq!(stats.inserted, 5);
        assert_eq!(stats.rejected, 0);
    }
}
