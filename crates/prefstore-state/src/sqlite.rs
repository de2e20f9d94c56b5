use std::{collections::BTreeMap, path::Path, sync::Arc};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::{Database, DatabaseError, Mutation, Snapshot, StoredEntry, Transaction};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    tag TEXT NOT NULL,
    payload TEXT NOT NULL
);";

/// A [Database] backed by a single SQLite file.
///
/// The full namespace is loaded into memory when opened; reads are served from the in-memory
/// snapshot and every commit is written through to disk before it is published.
pub struct SqliteDatabase {
    connection: Mutex<rusqlite::Connection>,
    snapshots: watch::Sender<Arc<Snapshot>>,
}

impl SqliteDatabase {
    /// Open or create the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let db = rusqlite::Connection::open(path)?;

        let mode: String =
            db.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened SQLite database");

        db.execute_batch(CREATE_TABLE)?;
        let entries = load_entries(&db)?;
        info!(path = %path.display(), entries = entries.len(), "Loaded preferences");

        let (snapshots, _) = watch::channel(Arc::new(Snapshot::from_entries(entries)));
        Ok(Self {
            connection: Mutex::new(db),
            snapshots,
        })
    }
}

fn load_entries(db: &rusqlite::Connection) -> Result<BTreeMap<String, StoredEntry>, DatabaseError> {
    let mut stmt = db.prepare("SELECT key, tag, payload FROM preferences")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            StoredEntry::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        ))
    })?;

    let mut entries = BTreeMap::new();
    for row in rows {
        let (key, entry) = row?;
        entries.insert(key, entry);
    }
    Ok(entries)
}

fn write_transaction(
    db: &mut rusqlite::Connection,
    transaction: &Transaction,
) -> Result<(), DatabaseError> {
    let tx = db.transaction()?;
    for mutation in transaction.mutations() {
        match mutation {
            Mutation::Set { key, entry } => {
                tx.execute(
                    "INSERT INTO preferences (key, tag, payload) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET tag = excluded.tag, payload = excluded.payload",
                    rusqlite::params![key, entry.tag(), entry.payload()],
                )?;
            }
            Mutation::Remove { key } => {
                tx.execute("DELETE FROM preferences WHERE key = ?1", [key])?;
            }
            Mutation::Clear => {
                tx.execute("DELETE FROM preferences", [])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

#[async_trait::async_trait]
impl Database for SqliteDatabase {
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
        let mut conn = self.connection.lock().await;
        write_transaction(&mut conn, &transaction)?;
        // Published while the connection is still held, so subscribers see commit order.
        self.snapshots
            .send_modify(|snapshot| Arc::make_mut(snapshot).apply(&transaction));
        Ok(())
    }
}
