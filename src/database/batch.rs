use super::db::DbClient;
use itertools::Itertools;
use tokio::sync::{Mutex, MutexGuard};

/// Accumulates SQL statements and ships them in one background round trip
/// once the configured threshold is exceeded. A threshold of zero commits on
/// every append.
///
/// [`UpdateBatch::lock`] hands out the batch mutex so a caller can serialize
/// a run of appends against other tasks sharing the same batch.
pub struct UpdateBatch {
    db: DbClient,
    threshold: usize,
    statements: Mutex<Vec<String>>
}

impl UpdateBatch {
    pub fn new(db: DbClient, threshold: usize) -> UpdateBatch {
        UpdateBatch {
            db,
            threshold,
            statements: Mutex::new(Vec::new())
        }
    }

    pub async fn lock(&self) -> BatchGuard<'_> {
        BatchGuard {
            batch: self,
            statements: self.statements.lock().await
        }
    }

    /// Appends a statement and commits the whole batch immediately.
    pub async fn append_and_commit(&self, statement: String) {
        let mut guard = self.lock().await;
        guard.statements.push(statement);
        guard.commit();
    }

    /// Commits whatever is still buffered. Call before dropping the batch;
    /// buffered statements don't flush themselves.
    pub async fn flush(&self) {
        self.lock().await.commit();
    }
}

pub struct BatchGuard<'a> {
    batch: &'a UpdateBatch,
    statements: MutexGuard<'a, Vec<String>>
}

impl BatchGuard<'_> {
    pub fn append(&mut self, statement: String) {
        self.statements.push(statement);

        if self.statements.len() > self.batch.threshold {
            self.commit();
        }
    }

    fn commit(&mut self) {
        if self.statements.is_empty() {
            return;
        }

        let joined = self.statements.drain(..).join("\n");
        self.batch.db.execute_background(joined);
    }
}
