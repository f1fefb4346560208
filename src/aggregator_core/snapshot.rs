//! Window aggregation
//!
//! Everything here is recomputed from scratch for each window; nothing is
//! carried between refresh cycles.

use crate::trade::{Side, Trade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerVolume {
    pub ticker: String,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTrade {
    pub trade_id: String,
    pub ticker: String,
    pub price: f64,
    pub volume: u32,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for RecentTrade {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id.clone(),
            ticker: trade.ticker.clone(),
            price: trade.price,
            volume: trade.volume,
            side: trade.side,
            timestamp: trade.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub trade_count: usize,
    pub mean_price: f64,
    pub total_volume: u64,
    pub top_ticker: String,
    /// Per ticker, ascending by timestamp
    pub price_series: BTreeMap<String, Vec<PricePoint>>,
    /// Descending by volume, ties by ticker ascending
    pub volume_ranking: Vec<TickerVolume>,
    /// The window itself, newest first
    pub recent_trades: Vec<RecentTrade>,
    pub computed_at: DateTime<Utc>,
}

/// What the display surfaces show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardView {
    /// The store has no trades yet
    NoData,
    Ready(AggregateSnapshot),
}

impl DashboardView {
    pub fn snapshot(&self) -> Option<&AggregateSnapshot> {
        match self {
            DashboardView::NoData => None,
            DashboardView::Ready(snapshot) => Some(snapshot),
        }
    }
}

/// Aggregate a window of trades.
///
/// The input order does not matter. An empty window yields
/// [`DashboardView::NoData`].
pub fn compute_snapshot(window: &[Trade]) -> DashboardView {
    if window.is_empty() {
        return DashboardView::NoData;
    }

    let trade_count = window.len();
    let mean_price = window.iter().map(|t| t.price).sum::<f64>() / trade_count as f64;
    let total_volume = window.iter().map(|t| u64::from(t.volume)).sum::<u64>();

    let mut volume_by_ticker: HashMap<&str, u64> = HashMap::new();
    for trade in window {
        *volume_by_ticker.entry(trade.ticker.as_str()).or_insert(0) += u64::from(trade.volume);
    }

    let mut volume_ranking: Vec<TickerVolume> = volume_by_ticker
        .into_iter()
        .map(|(ticker, volume)| TickerVolume {
            ticker: ticker.to_string(),
            volume,
        })
        .collect();
    volume_ranking.sort_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.ticker.cmp(&b.ticker)));

    // Non-empty window guarantees at least one entry
    let top_ticker = volume_ranking
        .first()
        .map(|tv| tv.ticker.clone())
        .unwrap_or_default();

    let mut ordered: Vec<&Trade> = window.iter().collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.trade_id.cmp(&b.trade_id))
    });

    let mut price_series: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    for trade in &ordered {
        price_series
            .entry(trade.ticker.clone())
            .or_default()
            .push(PricePoint {
                timestamp: trade.timestamp,
                price: trade.price,
            });
    }

    let recent_trades = ordered.iter().rev().map(|t| RecentTrade::from(*t)).collect();

    DashboardView::Ready(AggregateSnapshot {
        trade_count,
        mean_price,
        total_volume,
        top_ticker,
        price_series,
        volume_ranking,
        recent_trades,
        computed_at: Utc::now(),
    })
}
