use crate::broker::{BrokerError, BrokerRecord, LogConsumer, SqliteLogConsumer};
use crate::config::PipelineConfig;
use crate::consumer_core::{
    error_handler::RetryPolicy,
    ingest_filter::{filter_message, Rejection},
    sqlite_store::SqliteTradeStore,
    store_backend::{StoreError, TradeStore, WriteOutcome},
};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Gave up on position {position} after {attempts} failed writes: {last_error}")]
    WriteRetriesExhausted {
        position: i64,
        attempts: u32,
        last_error: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub write_failures: u64,
    pub poll_errors: u64,
    pub commit_errors: u64,
}

impl ConsumerStats {
    fn log(&self) {
        log::info!(
            "📊 Consumer: received={} inserted={} duplicates={} rejected={} write_failures={} poll_errors={} commit_errors={}",
            self.received,
            self.inserted,
            self.duplicates,
            self.rejected,
            self.write_failures,
            self.poll_errors,
            self.commit_errors
        );
    }
}

/// Terminal state of one message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Schema mismatch; dropped, position may advance
    Rejected(Rejection),
    /// Write committed (or already present); position may advance
    Written(WriteOutcome),
    /// Shutdown arrived while a failed write was waiting to be retried.
    /// The position must not advance.
    Interrupted,
}

impl MessageOutcome {
    pub fn may_commit(&self) -> bool {
        !matches!(self, MessageOutcome::Interrupted)
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub poll_timeout: Duration,
    pub write_retry: RetryPolicy,
    pub stats_log_interval: Duration,
}

impl From<&PipelineConfig> for ConsumerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll_timeout: config.poll_timeout,
            write_retry: config.write_retry.clone(),
            stats_log_interval: config.stats_log_interval,
        }
    }
}

/// Filter one record and persist it if it is a trade.
///
/// Failed writes are retried here, on the same record, until the store
/// accepts it, the retry policy gives up (error) or `cancel` fires while
/// waiting (`Interrupted`). An attempt already in progress is never
/// abandoned.
pub async fn process_record<S: TradeStore>(
    store: &mut S,
    record: &BrokerRecord,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    stats: &mut ConsumerStats,
) -> Result<MessageOutcome, ConsumerError> {
    stats.received += 1;
    log::debug!(
        "📥 Received raw message at position {}: {}",
        record.position,
        String::from_utf8_lossy(&record.payload)
    );

    let trade = match filter_message(&record.payload) {
        Ok(trade) => trade,
        Err(rejection) => {
            stats.rejected += 1;
            log::warn!(
                "⚠️  Skipping message at position {} ({}): {}",
                record.position,
                rejection.reason(),
                rejection
            );
            return Ok(MessageOutcome::Rejected(rejection));
        }
    };

    let mut backoff = policy.backoff();
    loop {
        match store.insert_if_absent(&trade).await {
            Ok(outcome) => {
                match outcome {
                    WriteOutcome::Inserted => {
                        stats.inserted += 1;
                        log::info!(
                            "✅ Stored {} {} {} x{} @ {:.2}",
                            trade.trade_id,
                            trade.side,
                            trade.ticker,
                            trade.volume,
                            trade.price
                        );
                    }
                    WriteOutcome::Duplicate => {
                        stats.duplicates += 1;
                        log::info!("♻️  Duplicate trade {} ignored", trade.trade_id);
                    }
                }
                return Ok(MessageOutcome::Written(outcome));
            }
            Err(e) => {
                stats.write_failures += 1;
                log::error!(
                    "❌ Failed to persist trade {} (position {}): {}",
                    trade.trade_id,
                    record.position,
                    e
                );

                let delay = backoff
                    .next_delay()
                    .map_err(|exceeded| ConsumerError::WriteRetriesExhausted {
                        position: record.position,
                        attempts: exceeded.attempts,
                        last_error: e.to_string(),
                    })?;
                log::warn!("⏳ Retry attempt {} in {}ms", backoff.attempts(), delay.as_millis());

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        log::warn!(
                            "⚠️  Shutdown during write retry; position {} left uncommitted for redelivery",
                            record.position
                        );
                        return Ok(MessageOutcome::Interrupted);
                    }
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

/// Poll → filter → write → commit, one message at a time, until `cancel`.
///
/// A record's position is committed only after its outcome is terminal.
pub async fn consume_loop<C, S>(
    consumer: &mut C,
    store: &mut S,
    settings: &ConsumerSettings,
    cancel: &CancellationToken,
) -> Result<ConsumerStats, ConsumerError>
where
    C: LogConsumer,
    S: TradeStore,
{
    let mut stats = ConsumerStats::default();
    let mut last_stats_log = Instant::now();

    loop {
        if last_stats_log.elapsed() >= settings.stats_log_interval {
            stats.log();
            last_stats_log = Instant::now();
        }

        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            polled = consumer.poll(settings.poll_timeout) => polled,
        };

        let record = match polled {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                stats.poll_errors += 1;
                log::error!("❌ Poll error: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(settings.poll_timeout) => {}
                }
                continue;
            }
        };

        // Not raced against cancel: the current message always finishes
        let outcome = process_record(store, &record, &settings.write_retry, cancel, &mut stats).await?;
        if !outcome.may_commit() {
            break;
        }

        if let Err(e) = consumer.commit(&record).await {
            // Redelivery of an already-written record is harmless
            stats.commit_errors += 1;
            log::error!("❌ Failed to commit position {}: {}", record.position, e);
        }
    }

    Ok(stats)
}

/// Open the log subscription and the trade store, then consume until `cancel`.
pub async fn run(config: &PipelineConfig, cancel: CancellationToken) -> Result<ConsumerStats, ConsumerError> {
    let consumer = SqliteLogConsumer::subscribe(
        &config.broker_path,
        &config.group_id,
        &config.topic,
        config.offset_reset,
    )?;
    let store = SqliteTradeStore::new(&config.db_path)?;

    run_with(consumer, store, ConsumerSettings::from(config), cancel).await
}

/// Consume with already opened connections; both are closed on return.
pub async fn run_with<C, S>(
    mut consumer: C,
    mut store: S,
    settings: ConsumerSettings,
    cancel: CancellationToken,
) -> Result<ConsumerStats, ConsumerError>
where
    C: LogConsumer,
    S: TradeStore,
{
    log::info!(
        "🟢 Consumer started ({} → {}). Waiting for trades...",
        consumer.backend_type(),
        store.backend_type()
    );

    let result = consume_loop(&mut consumer, &mut store, &settings, &cancel).await;

    // Both connections close here on every exit path
    drop(consumer);
    drop(store);

    match &result {
        Ok(stats) => {
            stats.log();
            log::info!("🔴 Consumer stopped, connections closed.");
        }
        Err(e) => log::error!("🔴 Consumer stopped with error: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{LogProducer, OffsetReset, SqliteLog};
    use crate::trade::Trade;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Log consumer that remembers every commit
    struct RecordingConsumer {
        inner: SqliteLogConsumer,
        commits: Vec<i64>,
    }

    #[async_trait]
    impl LogConsumer for RecordingConsumer {
        async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerRecord>, BrokerError> {
            self.inner.poll(timeout).await
        }

        async fn commit(&mut self, record: &BrokerRecord) -> Result<(), BrokerError> {
            self.commits.push(record.position);
            self.inner.commit(record).await
        }

        fn backend_type(&self) -> &'static str {
            "recording"
        }
    }

    /// In-memory store that fails the first `failures` writes
    struct FlakyStore {
        rows: HashMap<String, Trade>,
        failures: u32,
        attempts: u32,
        /// Fires the token once this many attempts have been made
        cancel_after: Option<(u32, CancellationToken)>,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                rows: HashMap::new(),
                failures,
                attempts: 0,
                cancel_after: None,
            }
        }
    }

    #[async_trait]
    impl TradeStore for FlakyStore {
        async fn insert_if_absent(&mut self, trade: &Trade) -> Result<WriteOutcome, StoreError> {
            self.attempts += 1;
            if let Some((after, cancel)) = &self.cancel_after {
                if self.attempts >= *after {
                    cancel.cancel();
                }
            }
            if self.attempts <= self.failures {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            if self.rows.contains_key(&trade.trade_id) {
                return Ok(WriteOutcome::Duplicate);
            }
            self.rows.insert(trade.trade_id.clone(), trade.clone());
            Ok(WriteOutcome::Inserted)
        }

        fn backend_type(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_policy(max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_retries,
        }
    }

    fn record(position: i64, payload: &str) -> BrokerRecord {
        BrokerRecord {
            topic: "orders".to_string(),
            position,
            payload: payload.as_bytes().to_vec(),
        }
    }

    const T1: &str = r#"{"trade_id":"T1","ticker":"AAPL","price":100.0,"volume":10,"side":"buy","timestamp":"2024-01-01T00:00:00Z"}"#;

    #[tokio::test]
    async fn test_write_is_retried_until_it_succeeds() {
        let mut store = FlakyStore::new(3);
        let mut stats = ConsumerStats::default();
        let cancel = CancellationToken::new();

        let outcome = process_record(&mut store, &record(1, T1), &fast_policy(None), &cancel, &mut stats)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Written(WriteOutcome::Inserted));
        assert_eq!(store.attempts, 4);
        assert_eq!(stats.write_failures, 3);
        assert_eq!(stats.inserted, 1);
    }

    #[tokio::test]
    async fn test_bounded_retry_gives_up_without_commit() {
        let mut store = FlakyStore::new(10);
        let mut stats = ConsumerStats::default();
        let cancel = CancellationToken::new();

        let err = process_record(&mut store, &record(7, T1), &fast_policy(Some(2)), &cancel, &mut stats)
            .await
            .unwrap_err();

        match err {
            ConsumerError::WriteRetriesExhausted { position, attempts, .. } => {
                assert_eq!(position, 7);
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(store.rows.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_retry_interrupts() {
        let mut store = FlakyStore::new(u32::MAX);
        let mut stats = ConsumerStats::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = process_record(&mut store, &record(1, T1), &fast_policy(None), &cancel, &mut stats)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Interrupted);
        assert!(!outcome.may_commit());
        // the attempt itself still ran
        assert_eq!(store.attempts, 1);
    }

    #[tokio::test]
    async fn test_legacy_message_is_rejected_and_not_written() {
        let mut store = FlakyStore::new(0);
        let mut stats = ConsumerStats::default();
        let cancel = CancellationToken::new();

        let outcome = process_record(
            &mut store,
            &record(1, r#"{"order_id":"O1","qty":5}"#),
            &fast_policy(None),
            &cancel,
            &mut stats,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, MessageOutcome::Rejected(_)));
        assert!(outcome.may_commit());
        assert_eq!(store.attempts, 0);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_counts_once() {
        let mut store = FlakyStore::new(0);
        let mut stats = ConsumerStats::default();
        let cancel = CancellationToken::new();
        let policy = fast_policy(None);

        process_record(&mut store, &record(1, T1), &policy, &cancel, &mut stats).await.unwrap();
        let second = process_record(&mut store, &record(2, T1), &policy, &cancel, &mut stats).await.unwrap();

        assert_eq!(second, MessageOutcome::Written(WriteOutcome::Duplicate));
        assert_eq!(store.rows.len(), 1);
        assert_eq!((stats.inserted, stats.duplicates), (1, 1));
    }

    #[tokio::test]
    async fn test_interrupted_write_is_never_committed() {
        let dir = tempdir().unwrap();
        let broker = dir.path().join("broker.db");
        let mut log = SqliteLog::open(&broker).unwrap();
        let position = log.send("orders", T1.as_bytes()).await.unwrap();

        let cancel = CancellationToken::new();
        let mut consumer = RecordingConsumer {
            inner: SqliteLogConsumer::subscribe(&broker, "group", "orders", OffsetReset::Earliest)
                .unwrap()
                .with_poll_interval(Duration::from_millis(5)),
            commits: Vec::new(),
        };
        let mut store = FlakyStore::new(u32::MAX);
        store.cancel_after = Some((3, cancel.clone()));
        let settings = ConsumerSettings {
            poll_timeout: Duration::from_millis(50),
            write_retry: fast_policy(None),
            stats_log_interval: Duration::from_secs(60),
        };

        let stats = consume_loop(&mut consumer, &mut store, &settings, &cancel).await.unwrap();

        assert_eq!(stats.received, 1);
        assert_eq!(stats.write_failures, 3);
        assert!(store.rows.is_empty());
        assert!(consumer.commits.is_empty());
        assert_eq!(consumer.inner.committed_position().unwrap(), None);

        // Same group after restart gets the same record again
        let mut restarted = SqliteLogConsumer::subscribe(&broker, "group", "orders", OffsetReset::Earliest).unwrap();
        let redelivered = restarted.poll(Duration::from_millis(200)).await.unwrap().unwrap();
        assert_eq!(redelivered.position, position);
        assert_eq!(redelivered.payload, T1.as_bytes());
    }

    #[tokio::test]
    async fn test_exhausted_retries_stop_loop_without_commit() {
        let dir = tempdir().unwrap();
        let broker = dir.path().join("broker.db");
        SqliteLog::open(&broker).unwrap().send("orders", T1.as_bytes()).await.unwrap();

        let cancel = CancellationToken::new();
        let mut consumer = RecordingConsumer {
            inner: SqliteLogConsumer::subscribe(&broker, "group", "orders", OffsetReset::Earliest).unwrap(),
            commits: Vec::new(),
        };
        let mut store = FlakyStore::new(u32::MAX);
        let settings = ConsumerSettings {
            poll_timeout: Duration::from_millis(50),
            write_retry: fast_policy(Some(2)),
            stats_log_interval: Duration::from_secs(60),
        };

        let err = consume_loop(&mut consumer, &mut store, &settings, &cancel).await.unwrap_err();

        assert!(matches!(err, ConsumerError::WriteRetriesExhausted { attempts: 2, .. }));
        assert!(consumer.commits.is_empty());
        assert_eq!(consumer.inner.committed_position().unwrap(), None);
    }
}
