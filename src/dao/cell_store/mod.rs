pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use crate::dao::models::{
    CellData, CellId, CellPatch, League, NaturalKey, NewSeason, NumberAssignment,
    ScheduleCellEntity, SeasonEntity, SeasonId,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Exclusive hold on a season's numbering, released when dropped.
pub struct SeasonGuard {
    season_id: SeasonId,
    _hold: Box<dyn Send + Sync>,
}

impl SeasonGuard {
    /// Wrap a backend-specific hold (mutex guard, lease handle, ...).
    pub fn new(season_id: SeasonId, hold: impl Send + Sync + 'static) -> Self {
        Self {
            season_id,
            _hold: Box::new(hold),
        }
    }
}

impl fmt::Debug for SeasonGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeasonGuard")
            .field("season_id", &self.season_id)
            .finish_non_exhaustive()
    }
}

/// Abstraction over the persistence layer for schedule cells and seasons.
///
/// Besides plain row access, backends provide a season-scoped lock and an atomic batch update
/// of game numbers; together they let a season recompute run as one read-modify-write cycle.
pub trait CellStore: Send + Sync {
    /// Every cell of a season, ordered by natural key.
    fn find_cells_by_season(
        &self,
        season_id: SeasonId,
    ) -> BoxFuture<'static, StorageResult<Vec<ScheduleCellEntity>>>;
    fn find_cell_by_natural_key(
        &self,
        key: NaturalKey,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>>;
    fn find_cell_by_id(
        &self,
        id: CellId,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>>;
    /// Create or replace the row stored under the data's natural key.
    fn upsert_cell(&self, data: CellData) -> BoxFuture<'static, StorageResult<ScheduleCellEntity>>;
    /// Create a row; fails with a conflict when the natural key is taken.
    fn insert_cell(&self, data: CellData) -> BoxFuture<'static, StorageResult<ScheduleCellEntity>>;
    /// Patch a row by id. `None` when the row does not exist; a conflict when the patch moves
    /// the row onto a natural key owned by another row.
    fn update_cell_by_id(
        &self,
        id: CellId,
        patch: CellPatch,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>>;
    /// Delete a row, returning whether it existed.
    fn delete_cell_by_id(&self, id: CellId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Take the exclusive season lock, failing with
    /// [`StorageError::LockUnavailable`](crate::dao::storage::StorageError::LockUnavailable)
    /// when it cannot be obtained.
    fn acquire_season_lock(&self, season_id: SeasonId) -> BoxFuture<'static, StorageResult<SeasonGuard>>;
    /// Write game numbers for several cells; either every update lands or none does.
    fn batch_update_numbers(
        &self,
        updates: Vec<NumberAssignment>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn find_season(&self, id: SeasonId) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>>;
    /// Seasons, newest first, optionally restricted to one league.
    fn list_seasons(&self, league: Option<League>) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>>;
    /// Create a season; fails with a conflict when league and start date are taken.
    fn insert_season(&self, season: NewSeason) -> BoxFuture<'static, StorageResult<SeasonEntity>>;
    fn save_season(&self, season: SeasonEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Raise a season's week count to `week` in one atomic step. Returns the previous count when
    /// it grew, `None` when the season is missing or already long enough.
    fn grow_total_weeks(
        &self,
        season_id: SeasonId,
        week: i32,
    ) -> BoxFuture<'static, StorageResult<Option<i32>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
