//! Display surfaces for the dashboard view
//!
//! A surface receives the complete view each cycle and replaces whatever it
//! showed before. Nothing flows back from a surface to the pipeline.

use super::snapshot::DashboardView;
use crate::sqlite_pragma::ensure_parent_dir;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait DisplaySurface: Send {
    /// Replace the displayed view
    async fn publish(&mut self, view: &DashboardView) -> Result<(), DisplayError>;

    /// Get surface type for logging
    fn surface_type(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct BoardState {
    pub view: DashboardView,
    /// `None` until the first publish
    pub published_at: Option<DateTime<Utc>>,
}

/// Latest view held in memory, shared with the terminal UI
#[derive(Debug, Clone)]
pub struct SnapshotBoard {
    inner: Arc<RwLock<BoardState>>,
}

impl Default for SnapshotBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BoardState {
                view: DashboardView::NoData,
                published_at: None,
            })),
        }
    }

    pub async fn current(&self) -> BoardState {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl DisplaySurface for SnapshotBoard {
    async fn publish(&mut self, view: &DashboardView) -> Result<(), DisplayError> {
        let mut state = self.inner.write().await;
        state.view = view.clone();
        state.published_at = Some(Utc::now());
        Ok(())
    }

    fn surface_type(&self) -> &'static str {
        "board"
    }
}

/// Headless surface: pretty JSON file, replaced atomically
pub struct JsonSnapshotFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DisplayError> {
        let path = path.into();
        ensure_parent_dir(&path)?;

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        log::info!("📝 Writing dashboard snapshots to: {}", path.display());
        Ok(Self { path, tmp_path })
    }
}

#[async_trait]
impl DisplaySurface for JsonSnapshotFile {
    async fn publish(&mut self, view: &DashboardView) -> Result<(), DisplayError> {
        let json = serde_json::to_vec_pretty(view)?;
        tokio::fs::write(&self.tmp_path, json).await?;
        // Rename within one directory replaces the file in a single step
        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        Ok(())
    }

    fn surface_type(&self) -> &'static str {
        "json"
    }
}
