use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use prefstore_crypto::{create_key_storage, EncryptionEngine};
use prefstore_state::open_database;
use tracing::info;

use crate::{PreferenceError, PreferenceStore, PreferencesConfiguration};

/// Opens namespaces and hands out one shared [PreferenceStore] per namespace name.
///
/// Every store opened through the same registry shares one [EncryptionEngine], so concurrent
/// first uses across namespaces still create a single master key.
pub struct NamespaceRegistry {
    configuration: PreferencesConfiguration,
    engine: Arc<EncryptionEngine>,
    stores: Mutex<HashMap<String, PreferenceStore>>,
}

impl NamespaceRegistry {
    /// Create a registry using the key storage described by `configuration`.
    pub fn new(configuration: PreferencesConfiguration) -> Self {
        let engine = Arc::new(EncryptionEngine::new(create_key_storage(
            &configuration.key_storage,
        )));
        Self::with_engine(configuration, engine)
    }

    /// Create a registry around an existing engine. `configuration.key_storage` is ignored.
    pub fn with_engine(configuration: PreferencesConfiguration, engine: Arc<EncryptionEngine>) -> Self {
        Self {
            configuration,
            engine,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// The engine shared by every store of this registry.
    pub fn engine(&self) -> &Arc<EncryptionEngine> {
        &self.engine
    }

    /// Return the store for `name`, opening its database on first use.
    ///
    /// Names must be non-empty and consist of ASCII letters, digits, `_` and `-`.
    pub fn open(&self, name: &str) -> Result<PreferenceStore, PreferenceError> {
        validate_namespace(name)?;

        let mut stores = self.stores.lock().expect("Mutex should not be poisoned");
        if let Some(store) = stores.get(name) {
            return Ok(store.clone());
        }

        let database = open_database(&self.configuration.database, name)?;
        let store = PreferenceStore::new(
            name,
            database,
            self.engine.clone(),
            self.configuration.key_alias.clone(),
        );
        stores.insert(name.to_owned(), store.clone());
        info!(namespace = name, "Opened preference namespace");
        Ok(store)
    }
}

fn validate_namespace(name: &str) -> Result<(), PreferenceError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PreferenceError::InvalidNamespace(name.to_owned()))
    }
}
