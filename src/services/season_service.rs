//! Season bookkeeping: creation, listing, week count and closing.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::{
        cell_store::CellStore,
        models::{League, NewSeason, SeasonEntity, SeasonId, SeasonStatus, iso_date},
    },
    dto::{
        assignment::FinishSeasonRequest,
        season::{
            CreateSeasonRequest, DEFAULT_TOTAL_WEEKS, SeasonListQuery, SeasonView,
            UpdateSeasonRequest,
        },
    },
    error::ServiceError,
    services::season_lock::with_season_lock,
    state::SharedState,
};

/// Load a season or fail with [`ServiceError::NotFound`].
pub(crate) async fn load_season(
    store: &Arc<dyn CellStore>,
    season_id: SeasonId,
) -> Result<SeasonEntity, ServiceError> {
    store
        .find_season(season_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("season `{season_id}` not found")))
}

fn parse_league(code: &str) -> Result<League, ServiceError> {
    League::parse(code)
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown league `{code}`")))
}

pub async fn create_season(
    state: &SharedState,
    request: CreateSeasonRequest,
) -> Result<SeasonView, ServiceError> {
    request.validate()?;
    let league = parse_league(&request.league)?;
    let start_date = iso_date::parse(&request.start_date)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid startDate: {err}")))?;

    let store = state.require_cell_store().await?;
    let season = store
        .insert_season(NewSeason {
            league,
            start_date,
            total_weeks: request.total_weeks.unwrap_or(DEFAULT_TOTAL_WEEKS),
        })
        .await?;

    info!(season_id = season.id, league = league.code(), "season created");
    Ok(season.into())
}

pub async fn list_seasons(
    state: &SharedState,
    query: SeasonListQuery,
) -> Result<Vec<SeasonView>, ServiceError> {
    query.validate()?;
    let league = query.league.as_deref().map(parse_league).transpose()?;
    let store = state.require_cell_store().await?;
    let seasons = store.list_seasons(league).await?;
    Ok(seasons.into_iter().map(Into::into).collect())
}

pub async fn get_season(state: &SharedState, id: SeasonId) -> Result<SeasonView, ServiceError> {
    let store = state.require_cell_store().await?;
    Ok(load_season(&store, id).await?.into())
}

/// Change the week count and/or finished flag. The week count only shrinks when the same request
/// finishes the season.
pub async fn update_season(
    state: &SharedState,
    id: SeasonId,
    request: UpdateSeasonRequest,
) -> Result<SeasonView, ServiceError> {
    request.validate()?;
    if request.total_weeks.is_none() && request.is_finished.is_none() {
        return Err(ServiceError::InvalidInput("nothing to update".into()));
    }

    let store = state.require_cell_store().await?;
    load_season(&store, id).await?;

    // Saves grow the week count under the same lock, so the read below is not stale.
    let season = with_season_lock(state, &store, id, || async {
        let mut season = load_season(&store, id).await?;
        if let Some(weeks) = request.total_weeks {
            if weeks < season.total_weeks && request.is_finished != Some(true) {
                return Err(ServiceError::InvalidInput(format!(
                    "totalWeeks can only be lowered below {} when finishing the season",
                    season.total_weeks
                )));
            }
            season.total_weeks = weeks;
        }
        if let Some(finished) = request.is_finished {
            season.status = if finished {
                SeasonStatus::Finished
            } else {
                SeasonStatus::Active
            };
        }
        store.save_season(season.clone()).await?;
        Ok::<_, ServiceError>(season)
    })
    .await?;
    Ok(season.into())
}

/// Close a season, optionally overriding its final week count.
pub async fn finish_season(
    state: &SharedState,
    request: FinishSeasonRequest,
) -> Result<SeasonView, ServiceError> {
    request.validate()?;
    let season_id = request
        .season_id
        .ok_or_else(|| ServiceError::InvalidInput("seasonId is required".into()))?;

    let store = state.require_cell_store().await?;
    load_season(&store, season_id).await?;

    let season = with_season_lock(state, &store, season_id, || async {
        let mut season = load_season(&store, season_id).await?;
        season.status = SeasonStatus::Finished;
        if let Some(weeks) = request.total_weeks.filter(|weeks| *weeks > 0) {
            season.total_weeks = weeks;
        }
        store.save_season(season.clone()).await?;
        Ok::<_, ServiceError>(season)
    })
    .await?;
    info!(season_id, total_weeks = season.total_weeks, "season finished");
    Ok(season.into())
}

/// Raise the season's week count to `week` when a save lands past it. Failures are only logged.
pub(crate) async fn grow_total_weeks(store: &Arc<dyn CellStore>, season_id: SeasonId, week: i32) {
    match store.grow_total_weeks(season_id, week).await {
        Ok(Some(previous)) => info!(season_id, previous, total_weeks = week, "season grew"),
        Ok(None) => {}
        Err(err) => warn!(season_id, error = %err, "failed to grow totalWeeks"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::AppConfig, dao::cell_store::memory::MemoryCellStore, state::AppState};

    async fn state() -> SharedState {
        AppState::with_store(AppConfig::default(), Arc::new(MemoryCellStore::default())).await
    }

    fn create(body: serde_json::Value) -> CreateSeasonRequest {
        serde_json::from_value(body).expect("valid create body")
    }

    #[tokio::test]
    async fn create_applies_default_weeks_and_rejects_duplicates() {
        let state = state().await;
        let season = create_season(&state, create(json!({"league": "LVBP", "startDate": "2025-10-14"})))
            .await
            .expect("created");
        assert_eq!(season.total_weeks, 16);
        assert_eq!(season.status, "active");
        assert_eq!(season.start_date, "2025-10-14");

        let duplicate =
            create_season(&state, create(json!({"league": "LVBP", "startDate": "2025-10-14"}))).await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

        let other_league =
            create_season(&state, create(json!({"league": "LMBP", "startDate": "2025-10-14"}))).await;
        assert!(other_league.is_ok());
    }

    #[tokio::test]
    async fn create_validates_input() {
        let state = state().await;
        for body in [
            json!({"league": "MLB", "startDate": "2025-10-14"}),
            json!({"league": "LVBP", "startDate": "14-10-2025"}),
            json!({"league": "LVBP", "startDate": "2025-10-14", "totalWeeks": 61}),
            json!({"league": "LVBP", "startDate": "2025-10-14", "totalWeeks": 0}),
        ] {
            let result = create_season(&state, create(body.clone())).await;
            assert!(
                matches!(result, Err(ServiceError::InvalidInput(_))),
                "{body} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn list_filters_by_league_newest_first() {
        let state = state().await;
        for (league, date) in [("LVBP", "2024-10-01"), ("LMBP", "2025-01-01"), ("LVBP", "2025-10-01")] {
            create_season(&state, create(json!({"league": league, "startDate": date})))
                .await
                .expect("created");
        }

        let all = list_seasons(&state, SeasonListQuery::default()).await.expect("listed");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].start_date, "2025-10-01");

        let lvbp = list_seasons(
            &state,
            SeasonListQuery {
                league: Some("LVBP".into()),
            },
        )
        .await
        .expect("listed");
        assert_eq!(lvbp.len(), 2);
        assert!(lvbp.iter().all(|season| season.league == "LVBP"));
    }

    #[tokio::test]
    async fn update_only_shrinks_weeks_when_finishing() {
        let state = state().await;
        let season = create_season(&state, create(json!({"league": "LVBP", "startDate": "2025-10-14"})))
            .await
            .expect("created");

        let empty = update_season(&state, season.id, UpdateSeasonRequest::default()).await;
        assert!(matches!(empty, Err(ServiceError::InvalidInput(_))));

        let shrink = UpdateSeasonRequest {
            total_weeks: Some(10),
            is_finished: None,
        };
        assert!(matches!(
            update_season(&state, season.id, shrink).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let grow = UpdateSeasonRequest {
            total_weeks: Some(20),
            is_finished: None,
        };
        assert_eq!(update_season(&state, season.id, grow).await.expect("grown").total_weeks, 20);

        let finish = UpdateSeasonRequest {
            total_weeks: Some(12),
            is_finished: Some(true),
        };
        let finished = update_season(&state, season.id, finish).await.expect("finished");
        assert_eq!(finished.total_weeks, 12);
        assert!(finished.is_finished);

        assert!(matches!(
            get_season(&state, 999).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn finish_overrides_weeks_only_when_positive() {
        let state = state().await;
        let season = create_season(&state, create(json!({"league": "LMBP", "startDate": "2025-03-01"})))
            .await
            .expect("created");

        let request = |weeks: i32| FinishSeasonRequest {
            season_id: Some(season.id),
            total_weeks: Some(weeks),
        };
        let finished = finish_season(&state, request(0)).await.expect("finished");
        assert_eq!(finished.status, "finished");
        assert_eq!(finished.total_weeks, 16);

        let finished = finish_season(&state, request(9)).await.expect("finished");
        assert_eq!(finished.total_weeks, 9);
    }

    #[tokio::test]
    async fn grow_never_shrinks() {
        let state = state().await;
        let store = state.require_cell_store().await.expect("store");
        let season = create_season(&state, create(json!({"league": "LVBP", "startDate": "2025-10-14"})))
            .await
            .expect("created");

        grow_total_weeks(&store, season.id, 3).await;
        assert_eq!(get_season(&state, season.id).await.expect("season").total_weeks, 16);

        grow_total_weeks(&store, season.id, 18).await;
        assert_eq!(get_season(&state, season.id).await.expect("season").total_weeks, 18);

        // Unknown seasons are ignored.
        grow_total_weeks(&store, 404, 30).await;
    }

    #[tokio::test]
    async fn reopening_keeps_weeks_grown_by_saves() {
        let state = state().await;
        let store = state.require_cell_store().await.expect("store");
        let season = create_season(&state, create(json!({"league": "LVBP", "startDate": "2025-10-14"})))
            .await
            .expect("created");

        let guard = store.acquire_season_lock(season.id).await.expect("lock");
        let reopen = tokio::spawn({
            let state = state.clone();
            async move {
                let request = UpdateSeasonRequest {
                    total_weeks: None,
                    is_finished: Some(false),
                };
                update_season(&state, season.id, request).await
            }
        });

        // A save holding the lock grows the season while the update waits for it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!reopen.is_finished());
        grow_total_weeks(&store, season.id, 20).await;
        drop(guard);

        let reopened = reopen.await.expect("task joined").expect("updated");
        assert_eq!(reopened.total_weeks, 20);
        assert_eq!(get_season(&state, season.id).await.expect("season").total_weeks, 20);
    }
}
