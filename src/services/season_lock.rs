//! Season-scoped mutual exclusion for numbering writes.
//!
//! Every read-modify-write of a season's numbers runs inside [`with_season_lock`]. When the lock
//! cannot be taken after the configured attempts the work still runs, unlocked, and the
//! fallback is counted so operators can see it on the health endpoint.

use std::{future::Future, sync::Arc, time::Duration};

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::LockConfig,
    dao::{
        cell_store::{CellStore, SeasonGuard},
        models::SeasonId,
    },
    error::ServiceError,
    state::AppState,
};

/// Run `work` while holding the season lock of `season_id`.
pub async fn with_season_lock<F, Fut, T>(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    season_id: SeasonId,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let guard = acquire(state, store, season_id).await;
    let outcome = work().await;
    drop(guard);
    outcome
}

async fn acquire(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    season_id: SeasonId,
) -> Option<SeasonGuard> {
    let policy = &state.config().lock;
    let mut attempt = 1;
    loop {
        match store.acquire_season_lock(season_id).await {
            Ok(guard) => {
                if attempt > 1 {
                    debug!(season_id, attempt, "season lock acquired after retry");
                }
                return Some(guard);
            }
            Err(err) if attempt < policy.max_attempts => {
                let delay = backoff_delay(policy, attempt);
                debug!(season_id, attempt, error = %err, ?delay, "season lock busy; retrying");
                state.metrics().record_lock_retry();
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(
                    season_id,
                    attempts = attempt,
                    error = %err,
                    "season lock unavailable; proceeding without it"
                );
                state.metrics().record_lock_fallback();
                return None;
            }
        }
    }
}

/// Exponential backoff capped at `max_backoff`, jittered into its upper half.
fn backoff_delay(policy: &LockConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let ceiling = policy
        .initial_backoff
        .saturating_mul(1 << exponent)
        .min(policy.max_backoff);
    let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
    if ceiling_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(ceiling_ms / 2..=ceiling_ms))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::{config::AppConfig, dao::cell_store::memory::MemoryCellStore};

    fn config(max_attempts: u32) -> AppConfig {
        let mut config = AppConfig::default();
        config.lock = LockConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            wait: Duration::from_millis(10),
            lease: Duration::from_secs(1),
        };
        config
    }

    #[test]
    fn backoff_grows_within_bounds() {
        let policy = config(5).lock;
        for attempt in 1..=10 {
            let delay = backoff_delay(&policy, attempt);
            assert!(delay <= policy.max_backoff, "attempt {attempt}: {delay:?}");
        }
        let first = backoff_delay(&policy, 1);
        assert!(first <= Duration::from_millis(1));
    }

    #[tokio::test]
    async fn runs_work_under_the_lock() {
        let store: Arc<dyn CellStore> = Arc::new(MemoryCellStore::new(Duration::from_millis(10)));
        let state = AppState::with_store(config(2), store.clone()).await;

        let ran = AtomicBool::new(false);
        let value = with_season_lock(&state, &store, 1, || async {
            // The lock is held, so a second acquisition times out.
            assert!(store.acquire_season_lock(1).await.is_err());
            ran.store(true, Ordering::SeqCst);
            Ok::<_, ServiceError>(42)
        })
        .await
        .expect("work succeeds");

        assert_eq!(value, 42);
        assert!(ran.load(Ordering::SeqCst));
        assert!(store.acquire_season_lock(1).await.is_ok());
        assert_eq!(state.metrics().snapshot().lock_fallbacks, 0);
    }

    #[tokio::test]
    async fn falls_back_to_unlocked_after_retries() {
        let store: Arc<dyn CellStore> = Arc::new(MemoryCellStore::new(Duration::from_millis(10)));
        let state = AppState::with_store(config(3), store.clone()).await;
        let _held = store.acquire_season_lock(7).await.expect("first lock");

        let value = with_season_lock(&state, &store, 7, || async { Ok::<_, ServiceError>("done") })
            .await
            .expect("work still runs");

        assert_eq!(value, "done");
        let metrics = state.metrics().snapshot();
        assert_eq!(metrics.lock_retries, 2);
        assert_eq!(metrics.lock_fallbacks, 1);
    }

    #[tokio::test]
    async fn work_errors_are_returned_and_release_the_lock() {
        let store: Arc<dyn CellStore> = Arc::new(MemoryCellStore::new(Duration::from_millis(10)));
        let state = AppState::with_store(config(1), store.clone()).await;

        let result: Result<(), _> = with_season_lock(&state, &store, 3, || async {
            Err(ServiceError::NotFound("season 3".into()))
        })
        .await;

        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(store.acquire_season_lock(3).await.is_ok());
    }
}
