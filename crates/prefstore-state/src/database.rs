use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::{Snapshot, Transaction};

/// An error reported by a storage engine. These are passed on to callers unchanged.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A transactional, watchable key-value store holding a single namespace.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    /// The latest committed state.
    fn snapshot(&self) -> Arc<Snapshot>;

    /// Subscribe to committed states. The receiver starts at the latest snapshot and is notified
    /// after every commit.
    fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>>;

    /// Apply every mutation in `transaction` atomically. Completes once the commit is durable and
    /// visible to subscribers.
    async fn commit(&self, transaction: Transaction) -> Result<(), DatabaseError>;
}
