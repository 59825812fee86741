mod metrics;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::cell_store::CellStore, error::ServiceError};

pub use self::metrics::{NumberingMetrics, NumberingMetricsSnapshot};

pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle, configuration and counters.
pub struct AppState {
    cell_store: RwLock<Option<Arc<dyn CellStore>>>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    metrics: NumberingMetrics,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            cell_store: RwLock::new(None),
            config,
            degraded: degraded_tx,
            metrics: NumberingMetrics::default(),
        })
    }

    /// State with `store` already installed.
    pub async fn with_store(config: AppConfig, store: Arc<dyn CellStore>) -> SharedState {
        let state = Self::new(config);
        state.set_cell_store(store).await;
        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Numbering counters exposed on the health endpoint.
    pub fn metrics(&self) -> &NumberingMetrics {
        &self.metrics
    }

    /// Obtain a handle to the current cell store, if one is installed.
    pub async fn cell_store(&self) -> Option<Arc<dyn CellStore>> {
        let guard = self.cell_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current cell store, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_cell_store(&self) -> Result<Arc<dyn CellStore>, ServiceError> {
        self.cell_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new cell store implementation and leave degraded mode.
    pub async fn set_cell_store(&self, store: Arc<dyn CellStore>) {
        {
            let mut guard = self.cell_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current cell store and enter degraded mode.
    pub async fn clear_cell_store(&self) {
        {
            let mut guard = self.cell_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::cell_store::memory::MemoryCellStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_cell_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state
            .set_cell_store(Arc::new(MemoryCellStore::default()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().expect("sender alive"));
        assert!(!*watcher.borrow_and_update());

        state.clear_cell_store().await;
        assert!(state.is_degraded().await);
        assert!(state.cell_store().await.is_none());
    }
}
