//! In-process [`CellStore`] for single-instance deployments and tests.
//!
//! All tables live behind one `RwLock`, so every write (including a whole batch of number
//! updates) is applied atomically. Season locks are per-season async mutexes.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::{
    sync::{Mutex, RwLock},
    time::timeout,
};
use tracing::debug;

use super::{CellStore, SeasonGuard};
use crate::dao::{
    models::{
        CellData, CellId, CellPatch, League, NaturalKey, NewSeason, NumberAssignment,
        ScheduleCellEntity, SeasonEntity, SeasonId, SeasonStatus,
    },
    storage::{StorageError, StorageResult},
};

/// Default time to wait for a season lock before reporting it unavailable.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct MemoryCellStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<Tables>,
    season_locks: DashMap<SeasonId, Arc<Mutex<()>>>,
    lock_wait: Duration,
}

#[derive(Default)]
struct Tables {
    cells: BTreeMap<CellId, ScheduleCellEntity>,
    cells_by_key: HashMap<NaturalKey, CellId>,
    seasons: BTreeMap<SeasonId, SeasonEntity>,
    last_cell_id: CellId,
    last_season_id: SeasonId,
}

impl Tables {
    fn insert_new_cell(&mut self, data: CellData) -> ScheduleCellEntity {
        self.last_cell_id += 1;
        let now = SystemTime::now();
        let cell = ScheduleCellEntity::from_data(self.last_cell_id, data, now, now);
        self.cells_by_key.insert(cell.natural_key(), cell.id);
        self.cells.insert(cell.id, cell.clone());
        cell
    }
}

fn key_conflict(key: NaturalKey) -> StorageError {
    StorageError::conflict(format!(
        "a cell already exists for season {} week {} cell {}",
        key.season_id, key.week_number, key.cell_index
    ))
}

impl MemoryCellStore {
    /// Empty store waiting at most `lock_wait` for a season lock.
    pub fn new(lock_wait: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(Tables::default()),
                season_locks: DashMap::new(),
                lock_wait,
            }),
        }
    }

    async fn find_cells_by_season(&self, season_id: SeasonId) -> Vec<ScheduleCellEntity> {
        let tables = self.inner.tables.read().await;
        let mut cells: Vec<ScheduleCellEntity> = tables
            .cells
            .values()
            .filter(|cell| cell.season_id == season_id)
            .cloned()
            .collect();
        cells.sort_by_key(|cell| (cell.week_number, cell.cell_index));
        cells
    }

    async fn find_cell_by_natural_key(&self, key: NaturalKey) -> Option<ScheduleCellEntity> {
        let tables = self.inner.tables.read().await;
        tables
            .cells_by_key
            .get(&key)
            .and_then(|id| tables.cells.get(id))
            .cloned()
    }

    async fn find_cell_by_id(&self, id: CellId) -> Option<ScheduleCellEntity> {
        self.inner.tables.read().await.cells.get(&id).cloned()
    }

    async fn upsert_cell(&self, data: CellData) -> ScheduleCellEntity {
        let mut tables = self.inner.tables.write().await;
        let existing = tables.cells_by_key.get(&data.natural_key()).copied();
        match existing.and_then(|id| tables.cells.get_mut(&id)) {
            Some(row) => {
                *row = ScheduleCellEntity::from_data(row.id, data, row.created_at, SystemTime::now());
                row.clone()
            }
            None => tables.insert_new_cell(data),
        }
    }

    async fn insert_cell(&self, data: CellData) -> StorageResult<ScheduleCellEntity> {
        let mut tables = self.inner.tables.write().await;
        let key = data.natural_key();
        if tables.cells_by_key.contains_key(&key) {
            return Err(key_conflict(key));
        }
        Ok(tables.insert_new_cell(data))
    }

    async fn update_cell_by_id(
        &self,
        id: CellId,
        patch: CellPatch,
    ) -> StorageResult<Option<ScheduleCellEntity>> {
        let mut tables = self.inner.tables.write().await;
        let Some(current) = tables.cells.get(&id) else {
            return Ok(None);
        };

        let old_key = current.natural_key();
        let created_at = current.created_at;
        let mut data = current.data();
        patch.apply(&mut data);
        let new_key = data.natural_key();

        if new_key != old_key {
            if tables.cells_by_key.contains_key(&new_key) {
                return Err(key_conflict(new_key));
            }
            tables.cells_by_key.remove(&old_key);
            tables.cells_by_key.insert(new_key, id);
        }

        let updated = ScheduleCellEntity::from_data(id, data, created_at, SystemTime::now());
        tables.cells.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_cell_by_id(&self, id: CellId) -> bool {
        let mut tables = self.inner.tables.write().await;
        match tables.cells.remove(&id) {
            Some(cell) => {
                tables.cells_by_key.remove(&cell.natural_key());
                true
            }
            None => false,
        }
    }

    async fn acquire_season_lock(&self, season_id: SeasonId) -> StorageResult<SeasonGuard> {
        let mutex = self
            .inner
            .season_locks
            .entry(season_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match timeout(self.inner.lock_wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(SeasonGuard::new(season_id, guard)),
            Err(_) => Err(StorageError::lock_unavailable(
                season_id,
                format!("not released within {}ms", self.inner.lock_wait.as_millis()),
            )),
        }
    }

    async fn batch_update_numbers(&self, updates: Vec<NumberAssignment>) {
        let mut tables = self.inner.tables.write().await;
        let now = SystemTime::now();
        for update in updates {
            match tables.cells.get_mut(&update.cell_id) {
                Some(cell) => {
                    cell.game_number = update.game_number;
                    cell.game_number2 = update.game_number2;
                    cell.updated_at = now;
                }
                None => debug!(cell_id = update.cell_id, "skipping number update for deleted cell"),
            }
        }
    }

    async fn list_seasons(&self, league: Option<League>) -> Vec<SeasonEntity> {
        let tables = self.inner.tables.read().await;
        let mut seasons: Vec<SeasonEntity> = tables
            .seasons
            .values()
            .filter(|season| league.is_none_or(|league| season.league == league))
            .cloned()
            .collect();
        seasons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        seasons
    }

    async fn insert_season(&self, season: NewSeason) -> StorageResult<SeasonEntity> {
        let mut tables = self.inner.tables.write().await;
        if tables
            .seasons
            .values()
            .any(|existing| existing.league == season.league && existing.start_date == season.start_date)
        {
            return Err(StorageError::conflict(
                "a season with that league and start date already exists",
            ));
        }

        tables.last_season_id += 1;
        let entity = SeasonEntity {
            id: tables.last_season_id,
            league: season.league,
            start_date: season.start_date,
            total_weeks: season.total_weeks,
            status: SeasonStatus::Active,
            created_at: SystemTime::now(),
        };
        tables.seasons.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn save_season(&self, season: SeasonEntity) {
        let mut tables = self.inner.tables.write().await;
        tables.last_season_id = tables.last_season_id.max(season.id);
        tables.seasons.insert(season.id, season);
    }

    async fn grow_total_weeks(&self, season_id: SeasonId, week: i32) -> Option<i32> {
        let mut tables = self.inner.tables.write().await;
        let season = tables.seasons.get_mut(&season_id)?;
        if week <= season.total_weeks {
            return None;
        }
        Some(std::mem::replace(&mut season.total_weeks, week))
    }
}

impl Default for MemoryCellStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_WAIT)
    }
}

impl CellStore for MemoryCellStore {
    fn find_cells_by_season(
        &self,
        season_id: SeasonId,
    ) -> BoxFuture<'static, StorageResult<Vec<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_cells_by_season(season_id).await) })
    }

    fn find_cell_by_natural_key(
        &self,
        key: NaturalKey,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_cell_by_natural_key(key).await) })
    }

    fn find_cell_by_id(
        &self,
        id: CellId,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.find_cell_by_id(id).await) })
    }

    fn upsert_cell(&self, data: CellData) -> BoxFuture<'static, StorageResult<ScheduleCellEntity>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.upsert_cell(data).await) })
    }

    fn insert_cell(&self, data: CellData) -> BoxFuture<'static, StorageResult<ScheduleCellEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_cell(data).await })
    }

    fn update_cell_by_id(
        &self,
        id: CellId,
        patch: CellPatch,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.update_cell_by_id(id, patch).await })
    }

    fn delete_cell_by_id(&self, id: CellId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_cell_by_id(id).await) })
    }

    fn acquire_season_lock(&self, season_id: SeasonId) -> BoxFuture<'static, StorageResult<SeasonGuard>> {
        let store = self.clone();
        Box::pin(async move { store.acquire_season_lock(season_id).await })
    }

    fn batch_update_numbers(
        &self,
        updates: Vec<NumberAssignment>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.batch_update_numbers(updates).await;
            Ok(())
        })
    }

    fn find_season(&self, id: SeasonId) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.tables.read().await.seasons.get(&id).cloned()) })
    }

    fn list_seasons(&self, league: Option<League>) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_seasons(league).await) })
    }

    fn insert_season(&self, season: NewSeason) -> BoxFuture<'static, StorageResult<SeasonEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_season(season).await })
    }

    fn save_season(&self, season: SeasonEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.save_season(season).await;
            Ok(())
        })
    }

    fn grow_total_weeks(
        &self,
        season_id: SeasonId,
        week: i32,
    ) -> BoxFuture<'static, StorageResult<Option<i32>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.grow_total_weeks(season_id, week).await) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::test_support::cell;

    fn data(week: i32, cell_index: i32) -> CellData {
        cell(0, week, cell_index).data()
    }

    #[tokio::test]
    async fn upsert_replaces_row_under_same_natural_key() {
        let store = MemoryCellStore::default();
        let first = store.upsert_cell(data(1, 1)).await;
        let mut changed = data(1, 1);
        changed.local_team = "Tigres".into();
        let second = store.upsert_cell(changed).await;

        assert_eq!(first.id, second.id);
        assert_eq!(second.local_team, "Tigres");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.find_cells_by_season(1).await.len(), 1);
    }

    #[tokio::test]
    async fn insert_rejects_taken_natural_key() {
        let store = MemoryCellStore::default();
        store.insert_cell(data(2, 4)).await.unwrap();
        let err = store.insert_cell(data(2, 4)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_cannot_move_onto_another_rows_key() {
        let store = MemoryCellStore::default();
        let a = store.upsert_cell(data(1, 1)).await;
        store.upsert_cell(data(1, 2)).await;

        let patch = CellPatch {
            cell_index: Some(2),
            ..CellPatch::default()
        };
        let err = store.update_cell_by_id(a.id, patch).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let moved = CellPatch {
            cell_index: Some(3),
            ..CellPatch::default()
        };
        let updated = store.update_cell_by_id(a.id, moved).await.unwrap().unwrap();
        assert_eq!(updated.cell_index, 3);
        let key = NaturalKey {
            season_id: 1,
            week_number: 1,
            cell_index: 3,
        };
        assert_eq!(store.find_cell_by_natural_key(key).await.map(|c| c.id), Some(a.id));
        assert!(store.update_cell_by_id(999, CellPatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn season_cells_come_back_in_natural_key_order() {
        let store = MemoryCellStore::default();
        for (week, index) in [(2, 0), (1, 3), (1, 1)] {
            store.upsert_cell(data(week, index)).await;
        }
        let keys: Vec<(i32, i32)> = store
            .find_cells_by_season(1)
            .await
            .iter()
            .map(|c| (c.week_number, c.cell_index))
            .collect();
        assert_eq!(keys, [(1, 1), (1, 3), (2, 0)]);
    }

    #[tokio::test]
    async fn season_lock_is_exclusive_per_season() {
        let store = MemoryCellStore::new(Duration::from_millis(20));
        let held = store.acquire_season_lock(1).await.unwrap();

        let err = store.acquire_season_lock(1).await.unwrap_err();
        assert!(matches!(err, StorageError::LockUnavailable { season_id: 1, .. }));
        assert!(store.acquire_season_lock(2).await.is_ok());

        drop(held);
        assert!(store.acquire_season_lock(1).await.is_ok());
    }

    #[tokio::test]
    async fn batch_update_skips_missing_rows() {
        let store = MemoryCellStore::default();
        let row = store.upsert_cell(data(1, 1)).await;
        store
            .batch_update_numbers(vec![
                NumberAssignment {
                    cell_id: row.id,
                    game_number: Some("1".into()),
                    game_number2: None,
                },
                NumberAssignment {
                    cell_id: 404,
                    game_number: Some("2".into()),
                    game_number2: None,
                },
            ])
            .await;
        let stored = store.find_cell_by_id(row.id).await.unwrap();
        assert_eq!(stored.game_number.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn duplicate_seasons_conflict() {
        let store = MemoryCellStore::default();
        let start = crate::dao::models::iso_date::parse("2025-10-14").unwrap();
        let season = NewSeason {
            league: League::Lvbp,
            start_date: start,
            total_weeks: 16,
        };
        store.insert_season(season.clone()).await.unwrap();
        assert!(store.insert_season(season.clone()).await.is_err());

        let other_league = NewSeason {
            league: League::Lmbp,
            ..season
        };
        assert!(store.insert_season(other_league).await.is_ok());
        assert_eq!(store.list_seasons(Some(League::Lvbp)).await.len(), 1);
    }

    #[tokio::test]
    async fn week_count_only_grows() {
        let store = MemoryCellStore::default();
        let season = store
            .insert_season(NewSeason {
                league: League::Lvbp,
                start_date: crate::dao::models::iso_date::parse("2025-10-14").unwrap(),
                total_weeks: 16,
            })
            .await
            .unwrap();

        assert_eq!(store.grow_total_weeks(season.id, 12).await, None);
        assert_eq!(store.grow_total_weeks(season.id, 20).await, Some(16));
        assert_eq!(store.grow_total_weeks(season.id, 18).await, None);
        assert_eq!(store.grow_total_weeks(404, 30).await, None);

        let stored = store.inner.tables.read().await.seasons[&season.id].clone();
        assert_eq!(stored.total_weeks, 20);
    }
}
