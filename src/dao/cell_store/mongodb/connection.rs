//! Connecting to MongoDB and probing what the deployment supports.

use std::time::Duration;

use mongodb::{
    Client, Database,
    bson::{Document, doc},
    options::ClientOptions,
};
use tokio::time::sleep;
use tracing::{info, warn};

use super::error::{MongoDaoError, MongoResult};

const CONNECT_ATTEMPTS: u32 = 10;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Live handles plus the deployment shape found by the `hello` handshake.
pub struct Connection {
    /// Client the database handle was opened from.
    pub client: Client,
    /// Handle on the configured database.
    pub database: Database,
    /// Replica set members and `mongos` routers accept multi-document transactions;
    /// standalone servers do not.
    pub supports_transactions: bool,
}

fn retry_delay(attempt: u32) -> Duration {
    FIRST_RETRY_DELAY
        .saturating_mul(1 << attempt.min(8))
        .min(MAX_RETRY_DELAY)
}

fn accepts_transactions(hello: &Document) -> bool {
    hello.get_str("setName").is_ok() || matches!(hello.get_str("msg"), Ok("isdbgrid"))
}

/// Open a client and wait for the server to answer `hello`, retrying with capped backoff.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<Connection> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempt = 0;
    let hello = loop {
        match database.run_command(doc! { "hello": 1 }).await {
            Ok(reply) => break reply,
            Err(source) if attempt + 1 >= CONNECT_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt + 1,
                    source,
                });
            }
            Err(err) => {
                warn!(attempt, error = %err, "MongoDB not reachable yet");
                sleep(retry_delay(attempt)).await;
                attempt += 1;
            }
        }
    };

    let supports_transactions = accepts_transactions(&hello);
    info!(
        database = database_name,
        retries = attempt,
        supports_transactions,
        "connected to MongoDB"
    );
    Ok(Connection {
        client,
        database,
        supports_transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        assert_eq!(retry_delay(0), Duration::from_millis(250));
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(4), Duration::from_secs(4));
        assert_eq!(retry_delay(5), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(30), MAX_RETRY_DELAY);
    }

    #[test]
    fn only_replica_sets_and_routers_take_transactions() {
        assert!(accepts_transactions(&doc! { "isWritablePrimary": true, "setName": "rs0" }));
        assert!(accepts_transactions(&doc! { "msg": "isdbgrid" }));
        assert!(!accepts_transactions(&doc! { "isWritablePrimary": true }));
    }
}
