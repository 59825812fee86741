use std::error::Error;
use thiserror::Error;

use crate::dao::models::SeasonId;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A unique key (cell natural key, season league/start date) is already taken.
    #[error("{message}")]
    Conflict { message: String },
    /// The season lock is held by someone else or could not be taken in time.
    #[error("season `{season_id}` lock unavailable: {message}")]
    LockUnavailable { season_id: SeasonId, message: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a unique-key conflict with a user-facing message.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }

    /// Construct a lock acquisition failure for `season_id`.
    pub fn lock_unavailable(season_id: SeasonId, message: impl Into<String>) -> Self {
        StorageError::LockUnavailable {
            season_id,
            message: message.into(),
        }
    }
}
