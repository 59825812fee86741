use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage status and numbering counters, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_cell_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let numbering = state.metrics().snapshot();
    if state.is_degraded().await {
        HealthResponse::degraded(numbering)
    } else {
        HealthResponse::ok(numbering)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::cell_store::memory::MemoryCellStore, state::AppState};

    #[tokio::test]
    async fn reports_degraded_without_a_store() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .set_cell_store(Arc::new(MemoryCellStore::default()))
            .await;
        state.metrics().record_lock_fallback();
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.numbering.lock_fallbacks, 1);
    }
}
