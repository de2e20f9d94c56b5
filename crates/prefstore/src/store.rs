use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
    sync::{Arc, RwLock},
};

use prefstore_crypto::EncryptionEngine;
use prefstore_state::{Database, StoredEntry, Transaction};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{
    subscription::ReadMode, EntryKind, PreferenceError, PreferenceSubscription, Scalar,
    ScalarType, Serializer, StringKey, TypedKey, ValidationError,
};

/// Alias of the master key used when none is configured.
pub const DEFAULT_KEY_ALIAS: &str = "prefstore_master_key";

/// A typed view over one namespace of preferences.
///
/// Clones share the same namespace. Writes are handed to the runtime before they are awaited, so
/// a write that has been issued completes even if the calling future is dropped.
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    namespace: String,
    key_alias: String,
    database: Arc<dyn Database>,
    engine: Arc<EncryptionEngine>,
    /// Type each key name was first used with
    bindings: RwLock<HashMap<String, ScalarType>>,
}

impl fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("namespace", &self.inner.namespace)
            .field("key_alias", &self.inner.key_alias)
            .finish()
    }
}

impl PreferenceStore {
    /// Create a store over `database`, encrypting sensitive values with the master key stored
    /// under `key_alias`.
    pub fn new(
        namespace: impl Into<String>,
        database: Arc<dyn Database>,
        engine: Arc<EncryptionEngine>,
        key_alias: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                namespace: namespace.into(),
                key_alias: key_alias.into(),
                database,
                engine,
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The namespace name.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Subscribe to the value stored under `key`.
    ///
    /// The first call to [PreferenceSubscription::next] yields the current value, later calls
    /// wait for the value to change. Fails immediately if `T` is not the key's declared type.
    pub fn get_data<T: Scalar>(
        &self,
        key: &TypedKey,
    ) -> Result<PreferenceSubscription<T>, PreferenceError> {
        check_type::<T>(key)?;
        self.bind(key)?;
        Ok(PreferenceSubscription::new(
            self.inner.database.subscribe(),
            key.name().to_owned(),
            ReadMode::Plain(key.scalar_type()),
        ))
    }

    /// Store `value` under `key`. Completes once the value is committed.
    pub async fn set_data<T: Scalar>(&self, key: &TypedKey, value: T) -> Result<(), PreferenceError> {
        check_type::<T>(key)?;
        self.bind(key)?;
        let payload = Serializer::encode(&value.into_value())?;
        let entry = StoredEntry::new(key.scalar_type().tag(), payload);

        self.commit(Transaction::new().set(key.name(), entry)).await?;
        debug!(namespace = %self.inner.namespace, key = key.name(), "Stored preference");
        Ok(())
    }

    /// Subscribe to the encrypted value stored under `key`. See [PreferenceStore::get_data].
    pub fn get_encrypted_data(
        &self,
        key: &StringKey,
    ) -> Result<PreferenceSubscription<String>, PreferenceError> {
        self.bind(key.as_typed())?;
        Ok(PreferenceSubscription::new(
            self.inner.database.subscribe(),
            key.name().to_owned(),
            ReadMode::Encrypted {
                engine: self.inner.engine.clone(),
                alias: self.inner.key_alias.clone(),
            },
        ))
    }

    /// Encrypt `value` and store the envelope under `key`.
    ///
    /// The master key is created on first use. Completes once the envelope is committed.
    pub async fn set_encrypted_data(
        &self,
        key: &StringKey,
        value: impl Into<String>,
    ) -> Result<(), PreferenceError> {
        self.bind(key.as_typed())?;
        let plaintext = Zeroizing::new(value.into());
        let name = key.name().to_owned();
        let inner = self.inner.clone();

        tokio::spawn(async move {
            let envelope = inner.engine.encrypt(&inner.key_alias, &plaintext).await?;
            let entry = StoredEntry::new(EntryKind::Encrypted.tag(), envelope.to_string());
            inner.database.commit(Transaction::new().set(name, entry)).await?;
            Ok::<_, PreferenceError>(())
        })
        .await??;

        debug!(namespace = %self.inner.namespace, key = key.name(), "Stored encrypted preference");
        Ok(())
    }

    /// Delete the value stored under `key`. Subscribers observe `None`.
    pub async fn remove_preference(&self, key: &TypedKey) -> Result<(), PreferenceError> {
        self.bind(key)?;
        self.commit(Transaction::new().remove(key.name())).await?;
        debug!(namespace = %self.inner.namespace, key = key.name(), "Removed preference");
        Ok(())
    }

    /// Delete every value in the namespace, plain and encrypted. This cannot be undone.
    pub async fn clear_data_store(&self) -> Result<(), PreferenceError> {
        self.commit(Transaction::new().clear()).await?;
        info!(namespace = %self.inner.namespace, "Cleared preference store");
        Ok(())
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), PreferenceError> {
        let database = self.inner.database.clone();
        tokio::spawn(async move { database.commit(transaction).await }).await??;
        Ok(())
    }

    /// Bind the key name to its type on first use and reject later uses with another type.
    fn bind(&self, key: &TypedKey) -> Result<(), ValidationError> {
        let mut bindings = self
            .inner
            .bindings
            .write()
            .expect("RwLock should not be poisoned");
        match bindings.entry(key.name().to_owned()) {
            Entry::Occupied(bound) if *bound.get() != key.scalar_type() => Err(ValidationError::new(
                key.name(),
                EntryKind::Plain(*bound.get()),
                EntryKind::Plain(key.scalar_type()),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(vacant) => {
                vacant.insert(key.scalar_type());
                Ok(())
            }
        }
    }
}

fn check_type<T: Scalar>(key: &TypedKey) -> Result<(), ValidationError> {
    if T::SCALAR_TYPE == key.scalar_type() {
        Ok(())
    } else {
        Err(ValidationError::new(
            key.name(),
            EntryKind::Plain(key.scalar_type()),
            EntryKind::Plain(T::SCALAR_TYPE),
        ))
    }
}
