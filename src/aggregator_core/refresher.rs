use super::display::DisplaySurface;
use super::snapshot::{compute_snapshot, DashboardView};
use super::source::WindowSource;
use crate::consumer_core::store_backend::StoreError;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Failed to read trade window: {0}")]
    Read(#[from] StoreError),
}

/// One read → aggregate → publish pipeline
pub struct Refresher<S: WindowSource> {
    source: S,
    surfaces: Vec<Box<dyn DisplaySurface>>,
    window_size: usize,
}

impl<S: WindowSource> Refresher<S> {
    pub fn new(source: S, window_size: usize) -> Self {
        Self {
            source,
            surfaces: Vec::new(),
            window_size,
        }
    }

    pub fn with_surface(mut self, surface: Box<dyn DisplaySurface>) -> Self {
        self.surfaces.push(surface);
        self
    }

    /// Run one cycle.
    ///
    /// A read failure publishes nothing, so surfaces keep the previous view.
    /// A surface that fails to publish is logged and the others still get
    /// the view.
    pub async fn refresh_once(&mut self) -> Result<DashboardView, RefreshError> {
        let window = self.source.read_window(self.window_size).await?;
        let view = compute_snapshot(&window);

        for surface in self.surfaces.iter_mut() {
            if let Err(e) = surface.publish(&view).await {
                log::error!("❌ Failed to publish to {} surface: {}", surface.surface_type(), e);
            }
        }

        Ok(view)
    }
}

/// Refresh on a fixed interval until `cancel`.
pub async fn run_refresher<S: WindowSource>(
    mut refresher: Refresher<S>,
    every: Duration,
    cancel: CancellationToken,
) {
    log::info!("⏰ Starting dashboard refresher (interval: {}ms, window: {})", every.as_millis(), refresher.window_size);

    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        let cycle = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            cycle = refresher.refresh_once() => cycle,
        };

        match cycle {
            Ok(DashboardView::NoData) => log::debug!("📭 No trades yet"),
            Ok(DashboardView::Ready(snapshot)) => log::debug!(
                "📊 Refreshed: {} trades, top {}",
                snapshot.trade_count,
                snapshot.top_ticker
            ),
            Err(e) => log::warn!("⚠️  Skipping refresh cycle: {}", e),
        }
    }

    log::info!("🔴 Dashboard refresher stopped");
}
