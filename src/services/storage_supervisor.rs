use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{cell_store::CellStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode while it is
/// unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn CellStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_cell_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
                state.clear_cell_store().await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn supervise(state: &SharedState, store: &dyn CellStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect(state, store).await {
            return;
        }
        state.update_degraded(false).await;
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn CellStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
