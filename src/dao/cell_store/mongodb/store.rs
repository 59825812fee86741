use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::{runtime::Handle, sync::RwLock, time::sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{Connection, establish_connection},
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoCellDocument, MongoCounterDocument, MongoSeasonDocument, doc_id, natural_key_filter,
    },
};
use crate::dao::{
    cell_store::{CellStore, SeasonGuard},
    models::{
        CellData, CellId, CellPatch, League, NaturalKey, NewSeason, NumberAssignment,
        ScheduleCellEntity, SeasonEntity, SeasonId, SeasonStatus,
    },
    storage::{StorageError, StorageResult},
};

const CELL_COLLECTION_NAME: &str = "cells";
const SEASON_COLLECTION_NAME: &str = "seasons";
const COUNTER_COLLECTION_NAME: &str = "counters";
const LOCK_COLLECTION_NAME: &str = "season_locks";

const CELL_COUNTER: &str = "cells";
const SEASON_COUNTER: &str = "seasons";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct MongoCellStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
    transactions: bool,
}

impl MongoState {
    fn new(connection: Connection, forced: Option<bool>) -> Self {
        if forced == Some(true) && !connection.supports_transactions {
            warn!("transactions forced on but the server is standalone; batch updates will fail");
        }
        Self {
            transactions: forced.unwrap_or(connection.supports_transactions),
            client: connection.client,
            database: connection.database,
        }
    }
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let connection =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.state.write().await = MongoState::new(connection, self.config.use_transactions);
        Ok(())
    }
}

/// Lease on a `season_locks` document, deleted when dropped.
struct SeasonLease {
    collection: Collection<Document>,
    season_id: SeasonId,
    owner: String,
}

impl Drop for SeasonLease {
    fn drop(&mut self) {
        let Ok(handle) = Handle::try_current() else {
            warn!(
                season_id = self.season_id,
                "no runtime to release season lease; it will expire"
            );
            return;
        };
        let collection = self.collection.clone();
        let filter = doc! { "_id": self.season_id, "owner": &self.owner };
        let season_id = self.season_id;
        handle.spawn(async move {
            if let Err(err) = collection.delete_one(filter).await {
                warn!(season_id, error = %err, "failed to release season lease");
            }
        });
    }
}

fn key_conflict(key: NaturalKey) -> StorageError {
    StorageError::conflict(format!(
        "a cell already exists for season {} week {} cell {}",
        key.season_id, key.week_number, key.cell_index
    ))
}

impl MongoCellStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let connection = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState::new(connection, config.use_transactions)),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let cell_index = IndexModel::builder()
            .keys(doc! { "season_id": 1, "week_number": 1, "cell_index": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("cell_natural_key_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        database
            .collection::<Document>(CELL_COLLECTION_NAME)
            .create_index(cell_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: CELL_COLLECTION_NAME,
                index: "season_id,week_number,cell_index",
                source,
            })?;

        let season_index = IndexModel::builder()
            .keys(doc! { "league": 1, "start_date": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("season_league_start_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        database
            .collection::<Document>(SEASON_COLLECTION_NAME)
            .create_index(season_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SEASON_COLLECTION_NAME,
                index: "league,start_date",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn cells(&self) -> Collection<MongoCellDocument> {
        self.database().await.collection(CELL_COLLECTION_NAME)
    }

    async fn seasons(&self) -> Collection<MongoSeasonDocument> {
        self.database().await.collection(SEASON_COLLECTION_NAME)
    }

    async fn next_id(&self, counter: &'static str) -> MongoResult<i64> {
        let collection: Collection<MongoCounterDocument> =
            self.database().await.collection(COUNTER_COLLECTION_NAME);
        let updated = collection
            .find_one_and_update(doc! { "_id": counter }, doc! { "$inc": { "value": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::NextId { counter, source })?;
        Ok(updated.map_or(1, |doc| doc.value))
    }

    async fn find_cells_by_season(&self, season_id: SeasonId) -> MongoResult<Vec<ScheduleCellEntity>> {
        let documents: Vec<MongoCellDocument> = self
            .cells()
            .await
            .find(doc! { "season_id": season_id })
            .sort(doc! { "week_number": 1, "cell_index": 1 })
            .await
            .map_err(|source| MongoDaoError::LoadSeasonCells { season_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSeasonCells { season_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_cell_by_natural_key(
        &self,
        key: NaturalKey,
    ) -> MongoResult<Option<ScheduleCellEntity>> {
        let document = self
            .cells()
            .await
            .find_one(natural_key_filter(key))
            .await
            .map_err(|source| MongoDaoError::LoadCell {
                id: format!("{}/{}/{}", key.season_id, key.week_number, key.cell_index),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn find_cell_by_id(&self, id: CellId) -> MongoResult<Option<ScheduleCellEntity>> {
        let document = self
            .cells()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadCell {
                id: id.to_string(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    /// Replace the row with `cell`, mapping unique index violations to conflicts.
    async fn replace_cell(&self, cell: ScheduleCellEntity) -> StorageResult<ScheduleCellEntity> {
        let key = cell.natural_key();
        let document = MongoCellDocument::from(cell.clone());
        match self
            .cells()
            .await
            .replace_one(doc_id(cell.id), &document)
            .upsert(true)
            .await
        {
            Ok(_) => Ok(cell),
            Err(err) if is_duplicate_key(&err) => Err(key_conflict(key)),
            Err(source) => Err(MongoDaoError::SaveCell {
                id: cell.id.to_string(),
                source,
            }
            .into()),
        }
    }

    async fn insert_cell(&self, data: CellData) -> StorageResult<ScheduleCellEntity> {
        let key = data.natural_key();
        let id = self.next_id(CELL_COUNTER).await?;
        let now = SystemTime::now();
        let cell = ScheduleCellEntity::from_data(id, data, now, now);
        let document = MongoCellDocument::from(cell.clone());
        match self.cells().await.insert_one(&document).await {
            Ok(_) => Ok(cell),
            Err(err) if is_duplicate_key(&err) => Err(key_conflict(key)),
            Err(source) => Err(MongoDaoError::SaveCell {
                id: id.to_string(),
                source,
            }
            .into()),
        }
    }

    async fn upsert_cell(&self, data: CellData) -> StorageResult<ScheduleCellEntity> {
        let key = data.natural_key();
        if let Some(existing) = self.find_cell_by_natural_key(key).await? {
            let cell =
                ScheduleCellEntity::from_data(existing.id, data, existing.created_at, SystemTime::now());
            return self.replace_cell(cell).await;
        }

        match self.insert_cell(data.clone()).await {
            // A concurrent writer created the row between our read and insert.
            Err(StorageError::Conflict { .. }) => {
                let existing = self
                    .find_cell_by_natural_key(key)
                    .await?
                    .ok_or_else(|| key_conflict(key))?;
                let cell = ScheduleCellEntity::from_data(
                    existing.id,
                    data,
                    existing.created_at,
                    SystemTime::now(),
                );
                self.replace_cell(cell).await
            }
            other => other,
        }
    }

    async fn update_cell_by_id(
        &self,
        id: CellId,
        patch: CellPatch,
    ) -> StorageResult<Option<ScheduleCellEntity>> {
        let Some(existing) = self.find_cell_by_id(id).await? else {
            return Ok(None);
        };
        let mut data = existing.data();
        patch.apply(&mut data);
        let cell = ScheduleCellEntity::from_data(id, data, existing.created_at, SystemTime::now());
        self.replace_cell(cell).await.map(Some)
    }

    async fn delete_cell_by_id(&self, id: CellId) -> MongoResult<bool> {
        let result = self
            .cells()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteCell { id, source })?;
        Ok(result.deleted_count > 0)
    }

    /// Try once to take the lease; `None` when another owner holds an unexpired one.
    async fn try_take_lease(&self, season_id: SeasonId) -> MongoResult<Option<SeasonLease>> {
        let collection = self.database().await.collection::<Document>(LOCK_COLLECTION_NAME);
        let owner = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let expires_at = DateTime::from_system_time(now + self.inner.config.lock_lease);

        let result = collection
            .find_one_and_update(
                doc! { "_id": season_id, "expires_at": { "$lt": DateTime::from_system_time(now) } },
                doc! { "$set": { "owner": &owner, "expires_at": expires_at } },
            )
            .upsert(true)
            .await;

        match result {
            Ok(_) => Ok(Some(SeasonLease {
                collection,
                season_id,
                owner,
            })),
            Err(err) if is_duplicate_key(&err) => Ok(None),
            Err(source) => Err(MongoDaoError::SeasonLock { season_id, source }),
        }
    }

    async fn acquire_season_lock(&self, season_id: SeasonId) -> StorageResult<SeasonGuard> {
        let deadline = Instant::now() + self.inner.config.lock_wait;
        loop {
            if let Some(lease) = self.try_take_lease(season_id).await? {
                return Ok(SeasonGuard::new(season_id, lease));
            }
            if Instant::now() >= deadline {
                return Err(StorageError::lock_unavailable(
                    season_id,
                    "lease held by another writer",
                ));
            }
            sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn batch_update_numbers(&self, updates: Vec<NumberAssignment>) -> MongoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let collection = self.cells().await;
        let now = DateTime::from_system_time(SystemTime::now());

        if !self.inner.state.read().await.transactions {
            for update in updates {
                collection
                    .update_one(doc_id(update.cell_id), number_update(&update, now))
                    .await
                    .map_err(|source| MongoDaoError::UpdateNumbers { source })?;
            }
            return Ok(());
        }

        let client = self.client().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::UpdateNumbers { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::UpdateNumbers { source })?;

        for update in &updates {
            // Dropping the session without committing aborts the transaction.
            collection
                .update_one(doc_id(update.cell_id), number_update(update, now))
                .session(&mut session)
                .await
                .map_err(|source| MongoDaoError::UpdateNumbers { source })?;
        }

        session
            .commit_transaction()
            .await
            .map_err(|source| MongoDaoError::UpdateNumbers { source })?;
        debug!(count = updates.len(), "game numbers committed");
        Ok(())
    }

    async fn find_season(&self, id: SeasonId) -> MongoResult<Option<SeasonEntity>> {
        let document = self
            .seasons()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSeason { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_seasons(&self, league: Option<League>) -> MongoResult<Vec<SeasonEntity>> {
        let filter = match league {
            Some(league) => doc! { "league": league.code() },
            None => doc! {},
        };
        let documents: Vec<MongoSeasonDocument> = self
            .seasons()
            .await
            .find(filter)
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .map_err(|source| MongoDaoError::ListSeasons { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSeasons { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_season(&self, season: NewSeason) -> StorageResult<SeasonEntity> {
        let id = self.next_id(SEASON_COUNTER).await?;
        let entity = SeasonEntity {
            id,
            league: season.league,
            start_date: season.start_date,
            total_weeks: season.total_weeks,
            status: SeasonStatus::Active,
            created_at: SystemTime::now(),
        };
        let document = MongoSeasonDocument::from(entity.clone());
        match self.seasons().await.insert_one(&document).await {
            Ok(_) => Ok(entity),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::conflict(
                "a season with that league and start date already exists",
            )),
            Err(source) => Err(MongoDaoError::SaveSeason { id, source }.into()),
        }
    }

    async fn save_season(&self, season: SeasonEntity) -> MongoResult<()> {
        let id = season.id;
        let document = MongoSeasonDocument::from(season);
        self.seasons()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSeason { id, source })?;
        Ok(())
    }

    async fn grow_total_weeks(&self, id: SeasonId, week: i32) -> MongoResult<Option<i32>> {
        let previous = self
            .seasons()
            .await
            .find_one_and_update(
                doc! { "_id": id, "total_weeks": { "$lt": week } },
                doc! { "$max": { "total_weeks": week } },
            )
            .return_document(ReturnDocument::Before)
            .await
            .map_err(|source| MongoDaoError::SaveSeason { id, source })?;
        Ok(previous.map(|document| document.total_weeks))
    }
}

fn number_update(update: &NumberAssignment, now: DateTime) -> Document {
    doc! {
        "$set": {
            "game_number": update.game_number.as_deref(),
            "game_number2": update.game_number2.as_deref(),
            "updated_at": now,
        }
    }
}

impl CellStore for MongoCellStore {
    fn find_cells_by_season(
        &self,
        season_id: SeasonId,
    ) -> BoxFuture<'static, StorageResult<Vec<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_cells_by_season(season_id).await.map_err(Into::into) })
    }

    fn find_cell_by_natural_key(
        &self,
        key: NaturalKey,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_cell_by_natural_key(key).await.map_err(Into::into) })
    }

    fn find_cell_by_id(
        &self,
        id: CellId,
    ) -> BoxFuture<'static, StorageResult<Option<ScheduleCellEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_cell_by_id(id).await.map_err(Into::into) })
    }

    fn upsert_cell(&self, data: CellData) -> BoxFuture<'static, StorageResult<ScheduleCellEntity>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_cell(data).await })
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
        Box::pin(async move { store.delete_cell_by_id(id).await.map_err(Into::into) })
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
        Box::pin(async move { store.batch_update_numbers(updates).await.map_err(Into::into) })
    }

    fn find_season(&self, id: SeasonId) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_season(id).await.map_err(Into::into) })
    }

    fn list_seasons(&self, league: Option<League>) -> BoxFuture<'static, StorageResult<Vec<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_seasons(league).await.map_err(Into::into) })
    }

    fn insert_season(&self, season: NewSeason) -> BoxFuture<'static, StorageResult<SeasonEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_season(season).await })
    }

    fn save_season(&self, season: SeasonEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_season(season).await.map_err(Into::into) })
    }

    fn grow_total_weeks(
        &self,
        season_id: SeasonId,
        week: i32,
    ) -> BoxFuture<'static, StorageResult<Option<i32>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .grow_total_weeks(season_id, week)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
