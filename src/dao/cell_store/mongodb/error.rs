use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

use crate::dao::models::{CellId, SeasonId};

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// MongoDB server code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to allocate an id from counter `{counter}`")]
    NextId {
        counter: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load cells of season `{season_id}`")]
    LoadSeasonCells {
        season_id: SeasonId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load cell `{id}`")]
    LoadCell {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save cell `{id}`")]
    SaveCell {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete cell `{id}`")]
    DeleteCell {
        id: CellId,
        #[source]
        source: MongoError,
    },
    #[error("failed to write game numbers")]
    UpdateNumbers {
        #[source]
        source: MongoError,
    },
    #[error("failed to acquire lock for season `{season_id}`")]
    SeasonLock {
        season_id: SeasonId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load season `{id}`")]
    LoadSeason {
        id: SeasonId,
        #[source]
        source: MongoError,
    },
    #[error("failed to list seasons")]
    ListSeasons {
        #[source]
        source: MongoError,
    },
    #[error("failed to save season `{id}`")]
    SaveSeason {
        id: SeasonId,
        #[source]
        source: MongoError,
    },
}

/// Whether `err` reports a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
