use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "umpire_schedule";
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);
const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Force multi-document transactions for batch number updates on or off. `None` follows
    /// what the server reports at connect time.
    pub use_transactions: Option<bool>,
    /// How long to poll for a season lock held by another writer.
    pub lock_wait: Duration,
    /// How long a season lock lease stays valid if its holder never releases it.
    pub lock_lease: Duration,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            use_transactions: None,
            lock_wait: DEFAULT_LOCK_WAIT,
            lock_lease: DEFAULT_LOCK_LEASE,
        })
    }

    /// Override season lock timing.
    pub fn with_lock_timing(mut self, wait: Duration, lease: Duration) -> Self {
        self.lock_wait = wait;
        self.lock_lease = lease;
        self
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` and `MONGO_TRANSACTIONS` from the environment.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, db.as_deref()).await?;
        if let Ok(flag) = std::env::var("MONGO_TRANSACTIONS") {
            config.use_transactions = Some(!matches!(flag.trim(), "0" | "false" | "off"));
        }
        Ok(config)
    }
}
