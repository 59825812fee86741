//! Schedule cell writes and the numbering that follows them.
//!
//! Every write runs inside the season lock: the cell is saved with numbers from the
//! [`allocator`](crate::schedule::allocator), then (unless disabled in the configuration) the
//! whole season is renumbered from the canonical map so concurrent edits converge on the same
//! dense sequence.

use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::{
    dao::{
        cell_store::CellStore,
        models::{CellData, CellId, CellPatch, ScheduleCellEntity, SeasonId},
    },
    dto::assignment::{
        AssignmentListQuery, AssignmentView, NextNumbersResponse, PatchAssignmentRequest,
        RecomputeResponse, UpsertAssignmentRequest,
    },
    error::ServiceError,
    schedule::{allocator, build_game_number_map, order::sort_canonical},
    services::{
        season_lock::with_season_lock,
        season_service::{grow_total_weeks, load_season},
    },
    state::{AppState, SharedState},
};

fn cell_not_found(id: CellId) -> ServiceError {
    ServiceError::NotFound(format!("assignment `{id}` not found"))
}

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

/// Cells of a season matching the query filters, in canonical order.
pub async fn list_assignments(
    state: &SharedState,
    query: AssignmentListQuery,
) -> Result<Vec<AssignmentView>, ServiceError> {
    query.validate()?;
    let season_id = query
        .season_id
        .ok_or_else(|| ServiceError::InvalidInput("seasonId is required".into()))?;

    let store = state.require_cell_store().await?;
    let mut cells = store.find_cells_by_season(season_id).await?;
    cells.retain(|cell| query.matches(cell));
    sort_canonical(&mut cells);
    Ok(cells.into_iter().map(Into::into).collect())
}

/// Numbers the next new cell of the season would receive. Nothing is reserved.
pub async fn preview_next_numbers(
    state: &SharedState,
    season_id: SeasonId,
    double: bool,
) -> Result<NextNumbersResponse, ServiceError> {
    let store = state.require_cell_store().await?;
    load_season(&store, season_id).await?;
    let cells = store.find_cells_by_season(season_id).await?;
    let preview = allocator::preview(&cells, double);
    Ok(NextNumbersResponse {
        season_id,
        next: preview.next,
        next2: preview.next2,
    })
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Save a full cell and renumber its season.
pub async fn upsert_assignment(
    state: &SharedState,
    request: UpsertAssignmentRequest,
) -> Result<AssignmentView, ServiceError> {
    request.validate()?;
    let id = request.id;
    let data = request.into_cell_data()?;
    let season_id = data.season_id;

    let store = state.require_cell_store().await?;
    load_season(&store, season_id).await?;

    let saved = with_season_lock(state, &store, season_id, || {
        upsert_and_renumber(state, &store, id, data)
    })
    .await?;
    Ok(saved.into())
}

/// Create a cell in a free slot. A taken natural key is a conflict, never an overwrite.
pub async fn create_assignment(
    state: &SharedState,
    request: UpsertAssignmentRequest,
) -> Result<AssignmentView, ServiceError> {
    request.validate()?;
    if request.id.is_some() {
        return Err(ServiceError::InvalidInput(
            "ids are assigned on creation; use /assignments/upsert to edit a cell".into(),
        ));
    }
    let data = request.into_cell_data()?;
    let season_id = data.season_id;

    let store = state.require_cell_store().await?;
    load_season(&store, season_id).await?;

    let saved = with_season_lock(state, &store, season_id, || {
        create_and_renumber(state, &store, data)
    })
    .await?;
    Ok(saved.into())
}

/// Edit some fields of a cell addressed by id, then allocate and renumber like an upsert.
pub async fn patch_assignment(
    state: &SharedState,
    id: CellId,
    request: PatchAssignmentRequest,
) -> Result<AssignmentView, ServiceError> {
    request.validate()?;
    let store = state.require_cell_store().await?;
    let season_id = store
        .find_cell_by_id(id)
        .await?
        .ok_or_else(|| cell_not_found(id))?
        .season_id;
    let patch = request.into_patch(id);

    let saved = with_season_lock(state, &store, season_id, || {
        patch_and_renumber(state, &store, id, patch)
    })
    .await?;
    Ok(saved.into())
}

/// Delete a cell and close the gap it leaves in the season's numbering.
pub async fn delete_assignment(state: &SharedState, id: CellId) -> Result<(), ServiceError> {
    let store = state.require_cell_store().await?;
    let season_id = store
        .find_cell_by_id(id)
        .await?
        .ok_or_else(|| cell_not_found(id))?
        .season_id;

    with_season_lock(state, &store, season_id, || {
        delete_and_renumber(state, &store, id, season_id)
    })
    .await
}

/// Renumber a whole season from scratch.
pub async fn recompute_season(
    state: &SharedState,
    season_id: SeasonId,
) -> Result<RecomputeResponse, ServiceError> {
    let store = state.require_cell_store().await?;
    load_season(&store, season_id).await?;

    let outcome = with_season_lock(state, &store, season_id, || {
        renumber_season(state, &store, season_id)
    })
    .await?;
    info!(
        season_id,
        updated = outcome.updated,
        legs = outcome.legs,
        "season recomputed"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Locked bodies
// ---------------------------------------------------------------------------

/// Row an upsert writes over: the row addressed by `id` when it belongs to the same season,
/// otherwise the row under the data's natural key.
async fn existing_row(
    store: &Arc<dyn CellStore>,
    id: Option<CellId>,
    data: &CellData,
) -> Result<Option<ScheduleCellEntity>, ServiceError> {
    if let Some(id) = id {
        match store.find_cell_by_id(id).await? {
            Some(row) if row.season_id == data.season_id => return Ok(Some(row)),
            Some(_) | None => debug!(cell_id = id, "stale assignment id; using natural key"),
        }
    }
    Ok(store.find_cell_by_natural_key(data.natural_key()).await?)
}

async fn upsert_and_renumber(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    id: Option<CellId>,
    mut data: CellData,
) -> Result<ScheduleCellEntity, ServiceError> {
    let season_id = data.season_id;
    let week = data.week_number;
    let existing = existing_row(store, id, &data).await?;
    let season = store.find_cells_by_season(season_id).await?;

    let numbers = allocator::allocate(&season, existing.as_ref(), &data);
    data.game_number = numbers.game_number;
    data.game_number2 = numbers.game_number2;

    let saved = match existing {
        Some(row) if row.natural_key() != data.natural_key() => {
            // Addressed by id and moved to another slot.
            store
                .update_cell_by_id(row.id, CellPatch::replace_with(data))
                .await?
                .ok_or_else(|| cell_not_found(row.id))?
        }
        _ => store.upsert_cell(data).await?,
    };
    debug!(
        season_id,
        cell_id = saved.id,
        week,
        cell = saved.cell_index,
        game_number = ?saved.game_number,
        "assignment saved"
    );

    grow_total_weeks(store, season_id, week).await;
    finish_write(state, store, saved).await
}

async fn create_and_renumber(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    mut data: CellData,
) -> Result<ScheduleCellEntity, ServiceError> {
    let season_id = data.season_id;
    let week = data.week_number;
    let season = store.find_cells_by_season(season_id).await?;

    let numbers = allocator::allocate(&season, None, &data);
    data.game_number = numbers.game_number;
    data.game_number2 = numbers.game_number2;

    let saved = store.insert_cell(data).await?;
    info!(season_id, cell_id = saved.id, week, cell = saved.cell_index, "assignment created");

    grow_total_weeks(store, season_id, week).await;
    finish_write(state, store, saved).await
}

async fn patch_and_renumber(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    id: CellId,
    patch: CellPatch,
) -> Result<ScheduleCellEntity, ServiceError> {
    let row = store
        .find_cell_by_id(id)
        .await?
        .ok_or_else(|| cell_not_found(id))?;
    let mut data = row.data();
    patch.apply(&mut data);

    let season = store.find_cells_by_season(row.season_id).await?;
    let numbers = allocator::allocate(&season, Some(&row), &data);
    data.game_number = numbers.game_number;
    data.game_number2 = numbers.game_number2;
    let week = data.week_number;

    let saved = store
        .update_cell_by_id(id, CellPatch::replace_with(data))
        .await?
        .ok_or_else(|| cell_not_found(id))?;

    grow_total_weeks(store, saved.season_id, week).await;
    finish_write(state, store, saved).await
}

/// Renumber after a save when configured to, returning the saved row with its final numbers.
async fn finish_write(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    saved: ScheduleCellEntity,
) -> Result<ScheduleCellEntity, ServiceError> {
    if !state.config().numbering.renumber_on_save {
        return Ok(saved);
    }

    let outcome = renumber_season(state, store, saved.season_id).await?;
    if outcome.updated == 0 {
        return Ok(saved);
    }
    Ok(store.find_cell_by_id(saved.id).await?.unwrap_or(saved))
}

async fn delete_and_renumber(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    id: CellId,
    season_id: SeasonId,
) -> Result<(), ServiceError> {
    if !store.delete_cell_by_id(id).await? {
        return Err(cell_not_found(id));
    }
    info!(season_id, cell_id = id, "assignment deleted");
    renumber_season(state, store, season_id).await?;
    Ok(())
}

/// Rebuild the season's map and write the cells whose numbers differ, in one batch.
async fn renumber_season(
    state: &AppState,
    store: &Arc<dyn CellStore>,
    season_id: SeasonId,
) -> Result<RecomputeResponse, ServiceError> {
    let cells = store.find_cells_by_season(season_id).await?;
    let map = build_game_number_map(&cells);
    let changes = map.changes(&cells);
    let updated = changes.len();

    if !changes.is_empty() {
        store.batch_update_numbers(changes).await?;
    }
    state.metrics().record_recompute(updated);
    debug!(
        season_id,
        cells = cells.len(),
        real_games = map.real_games(),
        updated,
        "season renumbered"
    );

    Ok(RecomputeResponse {
        season_id,
        real_games: map.real_games(),
        legs: map.legs(),
        updated,
    })
}
