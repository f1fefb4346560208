//! Synthetic trade generator

use crate::trade::{Side, Trade};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Builder;

pub const TICKERS: [&str; 7] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA"];

pub const MIN_PRICE: f64 = 50.0;
pub const MAX_PRICE: f64 = 500.0;
pub const MIN_VOLUME: u32 = 1;
pub const MAX_VOLUME: u32 = 1000;

/// Endless source of random trades.
///
/// Pacing is the caller's job; `next()` never returns `None`.
pub struct TradeGenerator<R: Rng = StdRng> {
    rng: R,
}

impl TradeGenerator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for TradeGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TradeGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(&mut self) -> Trade {
        // v4 UUID from 128 random bits
        let trade_id = Builder::from_random_bytes(self.rng.gen()).into_uuid();
        let ticker = TICKERS[self.rng.gen_range(0..TICKERS.len())];
        let price = round_cents(self.rng.gen_range(MIN_PRICE..=MAX_PRICE));
        let volume = self.rng.gen_range(MIN_VOLUME..=MAX_VOLUME);
        let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };

        Trade {
            trade_id: trade_id.to_string(),
            ticker: ticker.to_string(),
            price,
            volume,
            side,
            timestamp: Utc::now(),
        }
    }
}

impl<R: Rng> Iterator for TradeGenerator<R> {
    type Item = Trade;

    fn next(&mut self) -> Option<Trade> {
        Some(self.generate())
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
