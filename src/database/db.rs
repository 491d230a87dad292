use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc
};
use tokio_postgres::{Client, NoTls, Row};

/// Thin wrapper around one postgres connection.
///
/// Statements issued through [`DbClient::execute_background`] run detached
/// from the caller; [`DbClient::num_pending_queries`] reports how many of
/// them are still outstanding, which the reprocess driver uses as its
/// backpressure signal.
#[derive(Clone)]
pub struct DbClient {
    client: Arc<Client>,
    pending_queries: Arc<AtomicUsize>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, tokio_postgres::Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(client),
            pending_queries: Arc::new(AtomicUsize::new(0))
        })
    }

    pub async fn query(&self, sql: &str) -> Result<Vec<Row>, tokio_postgres::Error> {
        self.client.query(sql, &[]).await
    }

    pub async fn query_opt(&self, sql: &str) -> Result<Option<Row>, tokio_postgres::Error> {
        self.client.query_opt(sql, &[]).await
    }

    /// Runs a statement (or a `;`-joined run of statements) without making
    /// the caller wait for the round trip. Failures are logged; the caller
    /// has already moved on.
    pub fn execute_background(&self, sql: String) {
        let client = Arc::clone(&self.client);
        let pending_queries = Arc::clone(&self.pending_queries);

        pending_queries.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            if let Err(e) = client.batch_execute(&sql).await {
                log::error!("background statement failed: {}", e);
            }
            pending_queries.fetch_sub(1, Ordering::SeqCst);
        });
    }

    pub fn num_pending_queries(&self) -> usize {
        self.pending_queries.load(Ordering::SeqCst)
    }

    /// Upserts a named checkpoint counter into `osu_counts`.
    pub fn store_count(&self, key: &str, value: i64) {
        self.execute_background(format!(
            "INSERT INTO osu_counts (name, count) VALUES ('{}', {}) \
             ON CONFLICT (name) DO UPDATE SET count = EXCLUDED.count",
            key, value
        ));
    }

    /// Reads a named checkpoint counter; absence reads as -1.
    pub async fn retrieve_count(&self, key: &str) -> Result<i64, tokio_postgres::Error> {
        let row = self
            .query_opt(&format!("SELECT count FROM osu_counts WHERE name = '{}'", key))
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<_, Option<i64>>(0)?.unwrap_or(-1)),
            None => Ok(-1)
        }
    }
}
