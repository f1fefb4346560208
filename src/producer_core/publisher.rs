//! Fire-and-forget publisher with asynchronous delivery reports
//!
//! `publish()` serialises and enqueues; a background delivery task hands
//! payloads to the log and pushes a [`DeliveryReport`] per message onto a
//! bounded completion channel. The emission loop drains reports with
//! [`Publisher::poll_reports`] and never waits on a specific confirmation.

use crate::broker::LogProducer;
use crate::trade::Trade;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Delivery task has stopped")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryReport {
    Delivered {
        trade_id: String,
        topic: String,
        position: i64,
    },
    Failed {
        trade_id: String,
        topic: String,
        error: String,
    },
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryReport::Delivered { .. })
    }
}

/// Default completion callback
pub fn log_delivery_report(report: &DeliveryReport) {
    match report {
        DeliveryReport::Delivered { trade_id, topic, position } => {
            log::debug!("✅ Produced {} to {} at position {}", trade_id, topic, position);
        }
        DeliveryReport::Failed { trade_id, topic, error } => {
            log::error!("❌ Delivery of {} to {} failed: {}", trade_id, topic, error);
        }
    }
}

struct Outbound {
    trade_id: String,
    payload: Vec<u8>,
}

pub struct Publisher {
    queue: Option<mpsc::Sender<Outbound>>,
    reports: mpsc::Receiver<DeliveryReport>,
    /// Reports received while `publish` waited for queue space
    pending: VecDeque<DeliveryReport>,
    delivery_task: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Start the delivery task on the current runtime.
    ///
    /// `max_in_flight` bounds both the outbound queue and the report channel.
    pub fn spawn(producer: Box<dyn LogProducer>, topic: impl Into<String>, max_in_flight: usize) -> Self {
        let topic = topic.into();
        let capacity = max_in_flight.max(1);
        let (queue_tx, queue_rx) = mpsc::channel::<Outbound>(capacity);
        let (report_tx, report_rx) = mpsc::channel::<DeliveryReport>(capacity);

        log::info!("📤 Publisher started (topic: {}, backend: {}, max in flight: {})", topic, producer.backend_type(), capacity);

        let delivery_task = tokio::spawn(delivery_loop(producer, topic, queue_rx, report_tx));

        Self {
            queue: Some(queue_tx),
            reports: report_rx,
            pending: VecDeque::new(),
            delivery_task: Some(delivery_task),
        }
    }

    /// Serialise and enqueue one trade.
    ///
    /// Only waits when `max_in_flight` messages are already queued. While it
    /// waits it keeps taking reports off the completion channel, so the
    /// delivery task never stalls on reports nobody has polled yet.
    pub async fn publish(&mut self, trade: &Trade) -> Result<(), PublishError> {
        let payload = trade.to_payload()?;
        let queue = self.queue.clone().ok_or(PublishError::Closed)?;

        let permit = loop {
            tokio::select! {
                biased;
                permit = queue.reserve() => break permit.map_err(|_| PublishError::Closed)?,
                Some(report) = self.reports.recv() => self.pending.push_back(report),
            }
        };

        permit.send(Outbound {
            trade_id: trade.trade_id.clone(),
            payload,
        });
        Ok(())
    }

    /// Hand every completed delivery report to `on_report` without blocking.
    pub fn poll_reports<F>(&mut self, mut on_report: F) -> usize
    where
        F: FnMut(&DeliveryReport),
    {
        let mut drained = 0;
        while let Some(report) = self.pending.pop_front() {
            on_report(&report);
            drained += 1;
        }
        while let Ok(report) = self.reports.try_recv() {
            on_report(&report);
            drained += 1;
        }
        drained
    }

    /// Close the queue, wait until every in-flight message has a report and
    /// return the reports not yet polled.
    pub async fn flush(mut self) -> Vec<DeliveryReport> {
        drop(self.queue.take());

        let mut remaining: Vec<DeliveryReport> = self.pending.drain(..).collect();
        // Reports must keep draining while the task finishes, or a full
        // report channel would stall it.
        while let Some(report) = self.reports.recv().await {
            remaining.push(report);
        }

        if let Some(task) = self.delivery_task.take() {
            if let Err(e) = task.await {
                log::error!("❌ Delivery task ended abnormally: {}", e);
            }
        }

        log::info!("📤 Publisher flushed ({} outstanding reports)", remaining.len());
        remaining
    }
}

async fn delivery_loop(
    mut producer: Box<dyn LogProducer>,
    topic: String,
    mut queue: mpsc::Receiver<Outbound>,
    reports: mpsc::Sender<DeliveryReport>,
) {
    while let Some(outbound) = queue.recv().await {
        let report = match producer.send(&topic, &outbound.payload).await {
            Ok(position) => DeliveryReport::Delivered {
                trade_id: outbound.trade_id,
                topic: topic.clone(),
                position,
            },
            Err(e) => DeliveryReport::Failed {
                trade_id: outbound.trade_id,
                topic: topic.clone(),
                error: e.to_string(),
            },
        };

        if reports.send(report).await.is_err() {
            log::debug!("Delivery report receiver dropped");
        }
    }
    // report sender drops here, which ends flush()'s drain loop
}
