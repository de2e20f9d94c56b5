use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::{Database, DatabaseError, Snapshot, Transaction};

/// A process-local [Database]. Contents are lost when it is dropped.
pub struct MemoryDatabase {
    snapshots: watch::Sender<Arc<Snapshot>>,
    commit_lock: Mutex<()>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            snapshots,
            commit_lock: Mutex::new(()),
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Database for MemoryDatabase {
    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), DatabaseError> {
        if transaction.is_empty() {
            return Ok(());
        }
        let _guard = self.commit_lock.lock().await;
        self.snapshots
            .send_modify(|snapshot| Arc::make_mut(snapshot).apply(&transaction));
        Ok(())
    }
}
