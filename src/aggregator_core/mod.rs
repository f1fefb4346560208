//! Aggregator Core - dashboard refresh pipeline
//!
//! Each cycle is stateless: read the most recent trades, aggregate them and
//! hand the result to every display surface.
//!
//! # Architecture
//!
//! ```text
//! trades table → WindowSource (newest N, read-only)
//!     ↓
//! compute_snapshot → DashboardView (NoData | Ready)
//!     ↓
//! DisplaySurface → SnapshotBoard (terminal UI) or JsonSnapshotFile (headless)
//! ```

pub mod display;
pub mod refresher;
pub mod snapshot;
pub mod source;

pub use display::{BoardState, DisplayError, DisplaySurface, JsonSnapshotFile, SnapshotBoard};
pub use refresher::{run_refresher, RefreshError, Refresher};
pub use snapshot::{compute_snapshot, AggregateSnapshot, DashboardView, PricePoint, RecentTrade, TickerVolume};
pub use source::WindowSource;
