//! Tradeflow - synthetic trade events from producer to dashboard
//!
//! ```text
//! producer ──▶ message log ──▶ consumer (filter + idempotent write) ──▶ trades table
//!                                                                          │
//!                                       dashboard ◀── refresher ◀──────────┘
//! ```

pub mod aggregator_core;
pub mod broker;
pub mod config;
pub mod consumer_core;
pub mod producer_core;
pub mod runtime;
pub mod sqlite_pragma;
pub mod trade;
pub mod ui;

pub use config::PipelineConfig;
pub use runtime::{init_logging, install_interrupt_handler};
pub use trade::{Side, Trade};
