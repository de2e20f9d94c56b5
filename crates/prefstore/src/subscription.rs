use std::{fmt, marker::PhantomData, sync::Arc};

use prefstore_crypto::{EncryptedEnvelope, EncryptionEngine};
use prefstore_state::{Snapshot, StoredEntry};
use tokio::sync::watch;
use tracing::warn;

use crate::{
    EntryKind, PreferenceError, Scalar, ScalarType, ScalarValue, SerializationError, Serializer,
    ValidationError,
};

pub(crate) enum ReadMode {
    Plain(ScalarType),
    Encrypted {
        engine: Arc<EncryptionEngine>,
        alias: String,
    },
}

impl ReadMode {
    fn kind(&self) -> EntryKind {
        match self {
            ReadMode::Plain(scalar_type) => EntryKind::Plain(*scalar_type),
            ReadMode::Encrypted { .. } => EntryKind::Encrypted,
        }
    }
}

/// A cursor over the values of one preference.
///
/// Each subscription is independent: it starts at the value current when it is first polled and
/// then yields a new item every time the stored entry for its key changes. Commits touching
/// other keys are skipped. When an entry cannot be read (wrong stored type, undecodable payload,
/// failed decryption) the error is yielded once and the subscription ends.
pub struct PreferenceSubscription<T> {
    receiver: watch::Receiver<Arc<Snapshot>>,
    key: String,
    mode: ReadMode,
    started: bool,
    finished: bool,
    last: Option<StoredEntry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for PreferenceSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceSubscription")
            .field("key", &self.key)
            .field("kind", &self.mode.kind())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T: Scalar> PreferenceSubscription<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Snapshot>>, key: String, mode: ReadMode) -> Self {
        Self {
            receiver,
            key,
            mode,
            started: false,
            finished: false,
            last: None,
            _marker: PhantomData,
        }
    }

    /// The key this subscription follows.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next value.
    ///
    /// The first call returns the current value without waiting, `Ok(None)` meaning the key is
    /// absent. Returns `None` once the subscription has ended, either after an error or because
    /// the store was dropped.
    pub async fn next(&mut self) -> Option<Result<Option<T>, PreferenceError>> {
        if self.finished {
            return None;
        }

        let entry = if self.started {
            loop {
                if self.receiver.changed().await.is_err() {
                    self.finished = true;
                    return None;
                }
                let entry = self.current_entry();
                if entry != self.last {
                    break entry;
                }
            }
        } else {
            self.started = true;
            self.current_entry()
        };
        self.last = entry.clone();

        let result = match entry {
            Some(entry) => self.read(&entry).await.map(Some),
            None => Ok(None),
        };
        if let Err(e) = &result {
            warn!(key = %self.key, error = %e, "Preference subscription failed");
            self.finished = true;
        }
        Some(result)
    }

    fn current_entry(&mut self) -> Option<StoredEntry> {
        self.receiver.borrow_and_update().get(&self.key).cloned()
    }

    async fn read(&self, entry: &StoredEntry) -> Result<T, PreferenceError> {
        let stored = EntryKind::from_tag(entry.tag())
            .ok_or_else(|| SerializationError::UnknownTag(entry.tag().to_owned()))?;
        let requested = self.mode.kind();
        if stored != requested {
            return Err(ValidationError::new(&self.key, stored, requested).into());
        }

        let value = match &self.mode {
            ReadMode::Plain(scalar_type) => Serializer::decode(*scalar_type, entry.payload())?,
            ReadMode::Encrypted { engine, alias } => {
                let envelope: EncryptedEnvelope = entry.payload().parse()?;
                ScalarValue::String(engine.decrypt(alias, &envelope).await?)
            }
        };

        let found = EntryKind::Plain(value.scalar_type());
        T::from_value(value)
            .ok_or_else(|| ValidationError::new(&self.key, found, EntryKind::Plain(T::SCALAR_TYPE)).into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prefstore_state::{Database, MemoryDatabase, Transaction};

    use super::*;

    fn plain<T: Scalar>(db: &MemoryDatabase, key: &str) -> PreferenceSubscription<T> {
        PreferenceSubscription::new(db.subscribe(), key.to_owned(), ReadMode::Plain(T::SCALAR_TYPE))
    }

    #[tokio::test]
    async fn test_first_item_is_current_value() {
        let db = MemoryDatabase::new();
        let mut absent = plain::<i32>(&db, "volume");
        assert_eq!(absent.next().await.unwrap().unwrap(), None);

        db.commit(Transaction::new().set("volume", StoredEntry::new("int", "4")))
            .await
            .unwrap();
        let mut present = plain::<i32>(&db, "volume");
        assert_eq!(present.next().await.unwrap().unwrap(), Some(4));
        assert_eq!(absent.next().await.unwrap().unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_changes_to_other_keys_are_skipped() {
        let db = MemoryDatabase::new();
        let mut sub = plain::<bool>(&db, "flag");
        assert_eq!(sub.next().await.unwrap().unwrap(), None);

        db.commit(Transaction::new().set("other", StoredEntry::new("int", "1")))
            .await
            .unwrap();
        db.commit(Transaction::new().set("other", StoredEntry::new("int", "2")))
            .await
            .unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(20), sub.next())
            .await
            .is_err());

        db.commit(Transaction::new().set("flag", StoredEntry::new("boolean", "true")))
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_error_ends_subscription() {
        let db = MemoryDatabase::new();
        db.commit(Transaction::new().set("volume", StoredEntry::new("int", "007")))
            .await
            .unwrap();

        let mut sub = plain::<i32>(&db, "volume");
        assert!(matches!(
            sub.next().await,
            Some(Err(PreferenceError::Serialization(
                SerializationError::NonCanonical { .. }
            )))
        ));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_an_error() {
        let db = MemoryDatabase::new();
        db.commit(Transaction::new().set("volume", StoredEntry::new("short", "1")))
            .await
            .unwrap();

        let mut sub = plain::<i32>(&db, "volume");
        assert!(matches!(
            sub.next().await,
            Some(Err(PreferenceError::Serialization(SerializationError::UnknownTag(tag)))) if tag == "short"
        ));
    }

    #[tokio::test]
    async fn test_ends_when_database_is_dropped() {
        let db = MemoryDatabase::new();
        let mut sub = plain::<i64>(&db, "count");
        assert_eq!(sub.next().await.unwrap().unwrap(), None);
        drop(db);
        assert!(sub.next().await.is_none());
    }
}
